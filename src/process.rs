//! Process liveness probing.

use sysinfo::System;

/// Image name of the game client process.
pub const GAME_PROCESS: &str = "EscapeFromTarkov.exe";

/// Answers "is this process currently running?".
///
/// Implementations must fail closed: any failure while querying the process
/// table is reported as "not running", never the other way around.
pub trait ProcessProbe: Send + Sync {
    fn is_running(&self, process_name: &str) -> bool;
}

/// Probe backed by the OS process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_running(&self, process_name: &str) -> bool {
        let s = System::new_all();
        s.processes().values().any(|p| {
            p.name()
                .to_str()
                .map(|name| name.eq_ignore_ascii_case(process_name))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_process_is_not_running() {
        let probe = SystemProbe;
        assert!(!probe.is_running("definitely-not-a-real-process.exe"));
    }
}
