//! Linear undo/redo log with a merge window and bounded capacity.
//!
//! The log is a `VecDeque<Command>` plus a count of commands currently
//! applied (`done`). Everything in `log[..done]` is applied, everything in
//! `log[done..]` is the redo tail.
//!
//! ```text
//! execute(A) execute(B) execute(C)   log: [A, B, C]   done: 3
//! undo() undo()                      log: [A, B, C]   done: 1
//! execute(D)                         log: [A, D]      done: 2
//! ```
//!
//! Bookkeeping only changes after a command's mutation succeeds, so a failed
//! execute leaves the log untouched and a failed undo/redo leaves the cursor
//! where it was.

use std::collections::VecDeque;
use std::time::Duration;

use crate::commands::Command;
use crate::error::CommandError;
use crate::workspace::Workspace;

/// Tuning knobs for `History`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of log entries; the oldest is evicted past this.
    pub capacity: usize,
    /// Two mergeable commands closer together than this collapse into one.
    pub merge_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            merge_window_ms: 500,
        }
    }
}

impl HistoryConfig {
    /// Builder: set capacity (at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_merge_window(mut self, window: Duration) -> Self {
        self.merge_window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn merge_window(&self) -> Duration {
        Duration::from_millis(self.merge_window_ms)
    }
}

/// What `execute` did with the command it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Appended as a new log entry.
    Pushed,
    /// Folded into the entry at the cursor.
    Merged,
}

#[derive(Debug)]
pub struct History {
    log: VecDeque<Command>,
    done: usize,
    config: HistoryConfig,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        let config = config.with_capacity(config.capacity);
        Self {
            log: VecDeque::with_capacity(config.capacity.min(128)),
            done: 0,
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Apply `cmd` and record it, merging into the current entry when the
    /// two are compatible and within the merge window.
    pub fn execute(&mut self, ws: &mut Workspace, cmd: Command) -> Result<Recorded, CommandError> {
        if let Err(err) = cmd.apply(ws) {
            log::error!("execute '{}' failed: {err}", cmd.description());
            return Err(err);
        }

        if let Some(top) = self.current()
            && cmd.created_at().since(top.created_at()) <= self.config.merge_window()
            && let Some(merged) = top.merged_with(&cmd)
        {
            log::debug!("merge '{}' into entry {}", cmd.description(), self.done - 1);
            self.log.truncate(self.done);
            if let Some(slot) = self.log.back_mut() {
                *slot = merged;
            }
            return Ok(Recorded::Merged);
        }

        self.log.truncate(self.done);
        log::debug!("execute '{}'", cmd.description());
        self.log.push_back(cmd);
        self.done += 1;

        while self.log.len() > self.config.capacity {
            if let Some(evicted) = self.log.pop_front() {
                log::debug!("evict '{}'", evicted.description());
            }
            self.done -= 1;
        }
        Ok(Recorded::Pushed)
    }

    /// Invert the command at the cursor. `Ok(false)` when there is nothing
    /// to undo; on error the cursor is unchanged.
    pub fn undo(&mut self, ws: &mut Workspace) -> Result<bool, CommandError> {
        let Some(cmd) = self.current() else {
            return Ok(false);
        };
        if let Err(err) = cmd.invert(ws) {
            log::error!("undo '{}' failed: {err}", cmd.description());
            return Err(err);
        }
        log::debug!("undo '{}'", cmd.description());
        self.done -= 1;
        Ok(true)
    }

    /// Re-apply the command after the cursor. `Ok(false)` when there is
    /// nothing to redo; on error the cursor is unchanged.
    pub fn redo(&mut self, ws: &mut Workspace) -> Result<bool, CommandError> {
        let Some(cmd) = self.log.get(self.done) else {
            return Ok(false);
        };
        if let Err(err) = cmd.apply(ws) {
            log::error!("redo '{}' failed: {err}", cmd.description());
            return Err(err);
        }
        log::debug!("redo '{}'", cmd.description());
        self.done += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.done > 0
    }

    pub fn can_redo(&self) -> bool {
        self.done < self.log.len()
    }

    /// Label of the command `undo` would invert.
    pub fn undo_description(&self) -> Option<&str> {
        self.current().map(Command::description)
    }

    /// Label of the command `redo` would apply.
    pub fn redo_description(&self) -> Option<&str> {
        self.log.get(self.done).map(Command::description)
    }

    /// Drop every entry (new document loaded).
    pub fn reset(&mut self) {
        self.log.clear();
        self.done = 0;
    }

    /// Index of the last applied entry, `None` when nothing is applied.
    pub fn cursor(&self) -> Option<usize> {
        self.done.checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Command> {
        self.log.iter()
    }

    fn current(&self) -> Option<&Command> {
        self.cursor().and_then(|i| self.log.get(i))
    }
}
