//! Application service — the hexagonal core.
//!
//! [`AppService`] turns a request line into a [`Response`].  It owns the
//! sealed router, a handle on the shared actuator controller, and the
//! producer side of the motion queue.
//!
//! ```text
//!  (method, uri) ──▶ ┌──────────────────────┐ ──▶ EventSink
//!                    │      AppService      │
//!      PwmPort  ◀────│ Router · Controller  │ ──▶ MotionQueue
//!                    └──────────────────────┘
//! ```

use std::sync::{Arc, PoisonError};

use log::{info, warn};

use super::commands::MotionCommand;
use super::events::AppEvent;
use super::ports::{EventSink, PwmPort};
use crate::control::actuator::Motion;
use crate::control::profile::MotionProfile;
use crate::control::worker::{MotionQueue, SharedController};
use crate::error::ActuatorError;
use crate::http::router::{Method, Resolved, Router};
use crate::http::{Response, control_page};

pub struct AppService<P: PwmPort, S: EventSink> {
    router: Router,
    page: String,
    controller: SharedController<P>,
    queue: Arc<MotionQueue>,
    profile: MotionProfile,
    profile_actuator: u8,
    sink: S,
}

impl<P: PwmPort, S: EventSink> AppService<P, S> {
    pub fn new(
        router: Router,
        controller: SharedController<P>,
        queue: Arc<MotionQueue>,
        profile_actuator: u8,
        profile: MotionProfile,
        sink: S,
    ) -> Self {
        let page = control_page(router.actuator_count());
        Self {
            router,
            page,
            controller,
            queue,
            profile,
            profile_actuator,
            sink,
        }
    }

    /// Handle one request.  Never panics; every failure maps to a status.
    pub fn handle_request(&mut self, method: Method, uri: &str) -> Response {
        match self.router.resolve(method, uri) {
            Ok(Resolved::ControlPage) => Response::html(self.page.clone()),
            Ok(Resolved::Motion { id, motion }) => self.apply(id, motion),
            Ok(Resolved::Profile) => self.queue_profile(),
            Err(e) => {
                info!("HTTP: {:?} {} -> {} ({})", method, uri, e.status(), e);
                Response::text(e.status(), e.to_string())
            }
        }
    }

    fn apply(&mut self, id: u8, motion: Motion) -> Response {
        let result = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(id, motion);
        match result {
            Ok(ack) => {
                self.sink.emit(&AppEvent::ActuatorMoved { id, motion });
                Response::text(200, ack.to_string())
            }
            Err(e @ ActuatorError::InvalidActuatorId(_)) => {
                self.sink.emit(&AppEvent::CommandRejected { id });
                Response::text(400, e.to_string())
            }
            Err(e @ ActuatorError::Pwm(_)) => {
                warn!("HTTP: actuator {} {} failed: {}", id, motion, e);
                self.sink.emit(&AppEvent::CommandRejected { id });
                Response::text(500, e.to_string())
            }
        }
    }

    fn queue_profile(&mut self) -> Response {
        let cmd = MotionCommand::Profile {
            id: self.profile_actuator,
            profile: self.profile.clone(),
        };
        match self.queue.try_send(cmd) {
            Ok(()) => {
                self.sink.emit(&AppEvent::ProfileQueued {
                    id: self.profile_actuator,
                });
                Response::text(200, "motion profile queued")
            }
            Err(_) => {
                warn!("HTTP: motion queue full, profile rejected");
                Response::text(503, "motion queue full")
            }
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn controller(&self) -> &SharedController<P> {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::control::actuator::ActuatorController;
    use crate::control::worker::QUEUE_DEPTH;
    use crate::drivers::pwm::LedcPwm;
    use crate::pins;

    #[derive(Default)]
    struct VecSink(Vec<AppEvent>);

    impl EventSink for VecSink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn service() -> AppService<LedcPwm, VecSink> {
        let ctl = ActuatorController::configure(LedcPwm::new(), &pins::ACTUATOR_GPIOS, 5_000, 12)
            .unwrap();
        AppService::new(
            Router::standard(4).unwrap(),
            Arc::new(Mutex::new(ctl)),
            Arc::new(MotionQueue::new()),
            1,
            MotionProfile::extend_retract(3_000, 3_000),
            VecSink::default(),
        )
    }

    #[test]
    fn root_serves_control_page() {
        let mut svc = service();
        let r = svc.handle_request(Method::Get, "/");
        assert_eq!(r.status, 200);
        assert_eq!(r.content_type, "text/html");
        assert!(r.body.contains("move(4, 'extend')"));
        assert!(!r.body.contains("move(5,"));
    }

    #[test]
    fn motion_acknowledged() {
        let mut svc = service();
        let r = svc.handle_request(Method::Get, "/retract_3");
        assert_eq!(r, Response::text(200, "actuator 3 retracted"));
        assert_eq!(
            svc.sink().0,
            vec![AppEvent::ActuatorMoved { id: 3, motion: Motion::Retract }]
        );
    }

    #[test]
    fn profile_is_queued_until_full() {
        let mut svc = service();
        for _ in 0..QUEUE_DEPTH {
            assert_eq!(svc.handle_request(Method::Get, "/activate").status, 200);
        }
        let r = svc.handle_request(Method::Get, "/activate");
        assert_eq!(r.status, 503);
    }

    #[test]
    fn errors_map_to_status() {
        let mut svc = service();
        assert_eq!(svc.handle_request(Method::Get, "/extend_9").status, 400);
        assert_eq!(svc.handle_request(Method::Get, "/spin_1").status, 404);
        assert_eq!(svc.handle_request(Method::Get, "/missing").status, 404);
        assert_eq!(svc.handle_request(Method::Post, "/stop_1").status, 405);
        assert!(svc.sink().0.is_empty());
    }
}
