// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the logging type definitions for the per-tick control records.

use crate::controller::diff_ik::IkControllerState;
use crate::controller::Torques;
use std::collections::VecDeque;

/// One row of the log contains the controller state of a control tick and
/// the torque command that was produced from it.
#[derive(Debug, Clone)]
pub struct Record {
    /// Controller state snapshot after the tick's state transition.
    pub state: IkControllerState,
    /// Torque command returned for the tick.
    pub torques: Torques,
}

impl Record {
    /// creates a string representation based on the debug formatter
    pub fn log(&self) -> String {
        format!("{:?}", self.clone())
    }
}

pub(crate) struct ControlLogger {
    records: VecDeque<Record>,
    log_size: usize,
}

impl ControlLogger {
    pub fn new(log_size: usize) -> Self {
        ControlLogger {
            records: VecDeque::with_capacity(log_size),
            log_size,
        }
    }
    pub fn log(&mut self, state: &IkControllerState, torques: &Torques) {
        if self.log_size == 0 {
            return;
        }
        if self.records.len() == self.log_size {
            self.records.pop_front();
        }
        self.records.push_back(Record {
            state: state.clone(),
            torques: torques.clone(),
        });
    }
    pub fn flush(&mut self) -> Vec<Record> {
        self.records.drain(..).collect()
    }
}
