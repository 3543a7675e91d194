//! Fuzz target: `match_template`
//!
//! Splits the input into a template and a path at the first NUL and
//! matches them.  Must never panic; every capture must be a non-empty
//! substring of the path.
//!
//! cargo fuzz run fuzz_route_template

#![no_main]

use actuator_web::http::router::{match_template, validate_template};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let (template, path) = text.split_once('\0').unwrap_or(("/{action}_{id}", text));

    let _ = validate_template(template);
    if let Some(params) = match_template(template, path) {
        for name in ["action", "id", "a", "b"] {
            if let Some(v) = params.get(name) {
                assert!(!v.is_empty());
                assert!(path.contains(v));
            }
        }
    }
});
