#![forbid(unsafe_code)]

use crate::error::Error;
use crate::sensing::{ProcessInfo, ProcessKiller, ProcessSource};
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

/// Process source backed by the OS process table.
#[derive(Debug, Default)]
pub struct SysinfoSource {
    system: Mutex<System>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessSource for SysinfoSource {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, Error> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut processes = Vec::with_capacity(system.processes().len());
        for (pid, process) in system.processes() {
            processes.push(ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                exe_path: process
                    .exe()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                start_time: process.start_time(),
            });
        }
        Ok(processes)
    }
}

/// Killer backed by the OS process table.
#[derive(Debug, Default)]
pub struct SysinfoKiller {
    system: Mutex<System>,
}

impl SysinfoKiller {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessKiller for SysinfoKiller {
    fn kill(&self, pid: u32) -> Result<(), Error> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), false);

        let Some(process) = system.process(target) else {
            // Already exited between the snapshot and the kill.
            debug!(pid, "process gone before kill");
            return Ok(());
        };

        if process.kill() {
            Ok(())
        } else {
            Err(Error::ProcessTerminate { pid })
        }
    }
}
