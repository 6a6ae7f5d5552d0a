//! datakernel: an agent orchestration kernel.
//!
//! A planner converts free-form requests into ordered, typed intents; a
//! capability registry describes the agents that can execute them; the
//! runtime dispatches intents with failure recovery; a durable SQLite-backed
//! job queue schedules deferred work; a query cache and router sit between
//! the agents and the external compute engine; an in-process event bus
//! carries lifecycle notifications between the pieces.
//!
//! The crate is library-first: construct a [`core::Kernel`] with a
//! [`core::engine::ComputeEngine`] implementation and drive it directly.
//! The `datakernel` binary is a thin CLI over the same surface.

pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
