// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors which can occur while configuring or running
/// a controller.
#[derive(Error, Debug)]
pub enum ControlException {
    /// ConfigurationException is thrown when a controller is constructed from
    /// an invalid configuration, for example an unsupported robot name,
    /// joint index lists of mismatched lengths or an interpolation order
    /// which is not implemented. Construction fails instead of degrading to
    /// a default.
    #[error("Invalid controller configuration: {message}")]
    ConfigurationException {
        /// Explanatory string.
        message: String,
    },

    /// IkConvergenceException is thrown when the IK backend cannot produce a
    /// usable joint solution, for example when it returns a solution vector
    /// whose length does not match the number of controlled joints.
    #[error("IK did not converge after {iterations} iterations (residual {residual})")]
    IkConvergenceException {
        /// Pose error norm of the best solution found.
        residual: f64,
        /// Number of solver iterations that were spent.
        iterations: usize,
    },

    /// ActionDimensionException is thrown when a goal vector of the wrong
    /// dimensionality is passed to a controller.
    #[error("Expected an action of dimension {expected} but got {got}")]
    ActionDimensionException {
        /// Dimensionality declared by the controller.
        expected: usize,
        /// Dimensionality of the received action.
        got: usize,
    },

    /// MissingInputException is thrown when neither a positional delta nor
    /// any rotational goal is supplied to the control computation. The caller
    /// is responsible for well-formed inputs; the controller does not guess.
    #[error("Control computation requires a positional delta or a rotation goal")]
    MissingInputException,
}

/// creates a ConfigurationException from a string slice
pub(crate) fn create_configuration_exception(message: &str) -> ControlException {
    ControlException::ConfigurationException {
        message: message.to_string(),
    }
}

/// Result type which can have ControlException as Error
pub type ControlResult<T> = Result<T, ControlException>;
