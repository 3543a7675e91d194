//! `EspHttpServer` binding.
//!
//! One wildcard `/*` GET registration forwards every request into the
//! [`AppService`] behind a mutex, so duty writes from concurrent httpd
//! workers are serialized.

use std::sync::{Arc, Mutex, PoisonError};

use esp_idf_svc::io::Write;
use esp_idf_svc::http::Method;
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use log::info;

use super::router;
use crate::app::ports::{EventSink, PwmPort};
use crate::app::service::AppService;

/// Start the server.  The returned handle must be kept alive.
pub fn start<P, S>(
    service: Arc<Mutex<AppService<P, S>>>,
    max_handlers: u16,
) -> anyhow::Result<EspHttpServer<'static>>
where
    P: PwmPort + Send + 'static,
    S: EventSink + Send + 'static,
{
    let mut server = EspHttpServer::new(&Configuration {
        uri_match_wildcard: true,
        max_uri_handlers: usize::from(max_handlers),
        ..Default::default()
    })?;

    server.fn_handler("/*", Method::Get, move |req| -> anyhow::Result<()> {
        let response = service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_request(router::Method::Get, req.uri());
        let headers = [("Content-Type", response.content_type)];
        req.into_response(response.status, None, &headers)?
            .write_all(response.body.as_bytes())?;
        Ok(())
    })?;

    info!("HTTP: server listening (wildcard GET)");
    Ok(server)
}
