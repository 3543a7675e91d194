//! Fuzz target: `Router::resolve`
//!
//! Feeds arbitrary URIs to the sealed firmware route table.  Any accepted
//! motion must name an actuator inside the configured range.
//!
//! cargo fuzz run fuzz_router_resolve

#![no_main]

use actuator_web::http::router::{Method, Resolved, Router};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(router) = Router::standard(4) else {
        return;
    };
    if let Ok(Resolved::Motion { id, .. }) = router.resolve(Method::Get, uri) {
        assert!((1..=4).contains(&id));
    }
});
