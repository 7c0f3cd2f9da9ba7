//! Command handlers.
//!
//! - `export.rs`: site file to transfer archive
//! - `import.rs`: transfer archive into a site file, provisioning it if needed
//! - `inspect.rs`: manifest, entry and sheet listing, optional CSV dump

mod export;
mod import;
mod inspect;

pub use export::cmd_export;
pub use import::cmd_import;
pub use inspect::cmd_inspect;

use labsheet::Diagnostic;
use labsheet::DiagnosticKind;

/// How many diagnostics are printed before the rest are summarized.
const SHOWN_DIAGNOSTICS: usize = 20;

/// Prints a per-kind count and the first few diagnostics.
fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    println!();
    println!("Diagnostics ({}):", diagnostics.len());
    for kind in DiagnosticKind::all() {
        let count = diagnostics.iter().filter(|d| d.kind == *kind).count();
        if count > 0 {
            println!("  {kind:<24} {count}");
        }
    }
    println!();
    for diagnostic in diagnostics.iter().take(SHOWN_DIAGNOSTICS) {
        println!("  - {diagnostic}");
    }
    if diagnostics.len() > SHOWN_DIAGNOSTICS {
        println!("  ... and {} more", diagnostics.len() - SHOWN_DIAGNOSTICS);
    }
}
