//! Worker side of function entries.
//!
//! A function item runs in a re-executed copy of the supervisor binary. The copy must call [`enter`] with the same item list
//! before doing anything else; when the worker marker is present it runs the named entry and exits.
use std::env;

use tracing::{debug, error};

use cronvisor_bundle::BundledError;
use cronvisor_model::{Entry, WorkItem};

use crate::launch::WORKER_ENV;

/// Exit code of an entry that returned `Ok`.
pub const EXIT_OK: i32 = 0;
/// Exit code of an entry that returned an error.
pub const EXIT_FAILED: i32 = 1;
/// Exit code when the marker names no runnable function item.
pub const EXIT_UNKNOWN: i32 = 2;

/// Run the item named by the worker marker and exit, if the marker is set.
///
/// Returns normally in the supervisor process.
pub fn enter(items: &[WorkItem]) {
    let Some(name) = env::var_os(WORKER_ENV) else {
        return;
    };
    let name = name.to_string_lossy();
    std::process::exit(dispatch(items, &name));
}

/// Look up `name` in `items` and run it, returning the worker exit code.
pub fn dispatch(items: &[WorkItem], name: &str) -> i32 {
    match items.iter().find(|i| i.name() == name) {
        Some(item) => run_entry(item),
        None => {
            error!(target: "cronvisor.worker", worker = name, "no such work item");
            EXIT_UNKNOWN
        }
    }
}

/// Run a function entry in the current process and map its result to an exit code.
///
/// Failures are printed to stderr, except [`BundledError`] whose details were already rendered.
pub fn run_entry(item: &WorkItem) -> i32 {
    let Entry::Function(f) = item.entry() else {
        error!(target: "cronvisor.worker", worker = item.name(), "item is not a function entry");
        return EXIT_UNKNOWN;
    };

    debug!(target: "cronvisor.worker", worker = item.name(), "entry started");
    match f() {
        Ok(()) => EXIT_OK,
        Err(e) if e.is::<BundledError>() => EXIT_FAILED,
        Err(e) => {
            eprintln!("{} failed: {e:?}", item.name());
            EXIT_FAILED
        }
    }
}
