//! End-to-end request handling: router → service → controller → mock PWM,
//! plus the motion worker consuming queued profiles.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use actuator_web::app::events::AppEvent;
use actuator_web::app::service::AppService;
use actuator_web::control::actuator::{ActuatorController, Motion};
use actuator_web::control::profile::MotionProfile;
use actuator_web::control::worker::{MotionQueue, MotionWorker, SharedController};
use actuator_web::drivers::delay::StdDelay;
use actuator_web::http::router::{Method, Router};
use actuator_web::pins;

use crate::mock_hw::{MockPwm, RecordingSink};

struct Rig {
    service: AppService<MockPwm, RecordingSink>,
    controller: SharedController<MockPwm>,
    queue: Arc<MotionQueue>,
    sink: RecordingSink,
}

fn rig(profile: MotionProfile) -> Rig {
    rig_with(MockPwm::new(), profile)
}

fn rig_with(pwm: MockPwm, profile: MotionProfile) -> Rig {
    let controller: SharedController<MockPwm> = Arc::new(Mutex::new(
        ActuatorController::configure(pwm, &pins::ACTUATOR_GPIOS, 5_000, 12).unwrap(),
    ));
    let queue = Arc::new(MotionQueue::new());
    let sink = RecordingSink::new();
    let service = AppService::new(
        Router::standard(4).unwrap(),
        Arc::clone(&controller),
        Arc::clone(&queue),
        1,
        profile,
        sink.clone(),
    );
    Rig {
        service,
        controller,
        queue,
        sink,
    }
}

fn committed(c: &SharedController<MockPwm>, id: u8) -> (u32, u32) {
    let c = c.lock().unwrap();
    let pair = c.pair(id).unwrap();
    (c.pwm().committed(pair.forward), c.pwm().committed(pair.reverse))
}

#[test]
fn extend_then_stop_over_http() {
    let mut rig = rig(MotionProfile::new());

    let r = rig.service.handle_request(Method::Get, "/extend_2");
    assert_eq!((r.status, &*r.body), (200, "actuator 2 extended"));
    assert_eq!(committed(&rig.controller, 2), (4095, 0));

    let r = rig.service.handle_request(Method::Get, "/stop_2");
    assert_eq!((r.status, &*r.body), (200, "actuator 2 stopped"));
    assert_eq!(committed(&rig.controller, 2), (0, 0));

    assert_eq!(
        rig.sink.snapshot(),
        vec![
            AppEvent::ActuatorMoved { id: 2, motion: Motion::Extend },
            AppEvent::ActuatorMoved { id: 2, motion: Motion::Stop },
        ]
    );
}

#[test]
fn rejected_requests_leave_outputs_untouched() {
    let mut rig = rig(MotionProfile::new());
    let before = rig.controller.lock().unwrap().pwm().writes().len();

    for (uri, status) in [
        ("/extend_0", 400),
        ("/extend_5", 400),
        ("/extend_two", 400),
        ("/launch_1", 404),
        ("/favicon.ico", 404),
    ] {
        assert_eq!(rig.service.handle_request(Method::Get, uri).status, status, "{uri}");
    }
    assert_eq!(rig.service.handle_request(Method::Post, "/extend_1").status, 405);

    assert_eq!(rig.controller.lock().unwrap().pwm().writes().len(), before);
}

#[test]
fn activate_returns_immediately_and_worker_runs_profile() {
    let mut rig = rig(MotionProfile::extend_retract(20, 20));

    let r = rig.service.handle_request(Method::Get, "/activate");
    assert_eq!((r.status, &*r.body), (200, "motion profile queued"));
    // Nothing moved yet: the request context does not execute the profile.
    assert_eq!(committed(&rig.controller, 1), (0, 0));

    let worker_sink = RecordingSink::new();
    let mut worker = MotionWorker::new(
        Arc::clone(&rig.controller),
        Arc::clone(&rig.queue),
        StdDelay,
        worker_sink.clone(),
    );
    assert_eq!(worker.run_pending(), 1);

    assert_eq!(committed(&rig.controller, 1), (0, 0));
    assert!(!rig.controller.lock().unwrap().pwm().pair_overlap_seen);
    assert_eq!(
        worker_sink.snapshot(),
        vec![
            AppEvent::ProfileStarted { id: 1, steps: 3 },
            AppEvent::ActuatorMoved { id: 1, motion: Motion::Extend },
            AppEvent::ActuatorMoved { id: 1, motion: Motion::Retract },
            AppEvent::ActuatorMoved { id: 1, motion: Motion::Stop },
            AppEvent::ProfileFinished { id: 1, completed: true },
        ]
    );
}

#[test]
fn manual_commands_get_through_during_a_profile_hold() {
    let mut rig = rig(MotionProfile::extend_retract(300, 0));
    assert_eq!(rig.service.handle_request(Method::Get, "/activate").status, 200);

    let controller = Arc::clone(&rig.controller);
    let queue = Arc::clone(&rig.queue);
    let worker = thread::spawn(move || {
        let mut w = MotionWorker::new(controller, queue, StdDelay, RecordingSink::new());
        w.run_pending()
    });

    // Wait until the profile has extended actuator 1.
    while committed(&rig.controller, 1) != (4095, 0) {
        thread::sleep(Duration::from_millis(1));
    }
    let r = rig.service.handle_request(Method::Get, "/retract_3");
    assert_eq!(r.status, 200);
    assert_eq!(committed(&rig.controller, 3), (0, 4095));

    assert_eq!(worker.join().unwrap(), 1);
    assert_eq!(committed(&rig.controller, 1), (0, 0));
}

#[test]
fn driver_failure_answers_500_and_releases_the_pair() {
    // Actuator 2 reverse (channel 3) stops accepting writes after the extend.
    let mut rig = rig_with(MockPwm::failing(3, 2), MotionProfile::new());

    assert_eq!(rig.service.handle_request(Method::Get, "/extend_2").status, 200);
    assert_eq!(committed(&rig.controller, 2), (4095, 0));

    let r = rig.service.handle_request(Method::Get, "/retract_2");
    assert_eq!(r.status, 500);
    assert_eq!(committed(&rig.controller, 2), (0, 0));
    assert_eq!(
        rig.sink.snapshot(),
        vec![
            AppEvent::ActuatorMoved { id: 2, motion: Motion::Extend },
            AppEvent::CommandRejected { id: 2 },
        ]
    );
}

#[test]
fn profile_failing_mid_run_leaves_actuator_stopped() {
    // Channel 1 (actuator 1 reverse) fails once the extend step is written.
    let mut rig = rig_with(MockPwm::failing(1, 2), MotionProfile::extend_retract(10, 10));
    assert_eq!(rig.service.handle_request(Method::Get, "/activate").status, 200);

    let worker_sink = RecordingSink::new();
    let mut worker = MotionWorker::new(
        Arc::clone(&rig.controller),
        Arc::clone(&rig.queue),
        StdDelay,
        worker_sink.clone(),
    );
    assert_eq!(worker.run_pending(), 1);

    assert_eq!(committed(&rig.controller, 1), (0, 0));
    assert!(!rig.controller.lock().unwrap().pwm().pair_overlap_seen);
    assert_eq!(
        worker_sink.snapshot(),
        vec![
            AppEvent::ProfileStarted { id: 1, steps: 3 },
            AppEvent::ActuatorMoved { id: 1, motion: Motion::Extend },
            AppEvent::ProfileFinished { id: 1, completed: false },
        ]
    );
}
