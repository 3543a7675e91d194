//! Actuator controller against the recording PWM mock.

use actuator_web::control::actuator::{ActuatorController, Motion};
use actuator_web::error::ActuatorError;
use actuator_web::pins;

use crate::mock_hw::{MockPwm, PwmCall};

fn controller() -> ActuatorController<MockPwm> {
    ActuatorController::configure(MockPwm::new(), &pins::ACTUATOR_GPIOS, 5_000, 12).unwrap()
}

#[test]
fn configure_binds_gpio_pairs_in_channel_order() {
    let c = controller();
    let configured: Vec<_> = c
        .pwm()
        .calls
        .iter()
        .filter_map(|call| match call {
            PwmCall::Configure { channel, gpio } => Some((*channel, *gpio)),
            _ => None,
        })
        .collect();
    assert_eq!(
        configured,
        vec![(0, 12), (1, 13), (2, 14), (3, 15), (4, 16), (5, 17), (6, 18), (7, 19)]
    );
}

#[test]
fn stop_zeroes_both_channels() {
    let mut c = controller();
    c.apply(2, Motion::Extend).unwrap();
    c.apply(2, Motion::Stop).unwrap();
    assert_eq!((c.pwm().committed(2), c.pwm().committed(3)), (0, 0));
}

#[test]
fn extend_then_retract_leaves_reverse_driven() {
    let mut c = controller();
    c.apply(1, Motion::Extend).unwrap();
    c.apply(1, Motion::Retract).unwrap();
    assert_eq!((c.pwm().committed(0), c.pwm().committed(1)), (0, 4095));
    assert!(!c.pwm().pair_overlap_seen);
}

#[test]
fn direction_reversal_releases_before_driving() {
    let mut c = controller();
    c.apply(1, Motion::Extend).unwrap();
    let skip = c.pwm().writes().len();
    c.apply(1, Motion::Retract).unwrap();

    let writes = c.pwm().writes()[skip..].to_vec();
    assert_eq!(
        writes,
        vec![
            PwmCall::SetDuty { channel: 0, duty: 0 },
            PwmCall::SetDuty { channel: 1, duty: 4095 },
            PwmCall::Commit { channel: 0 },
            PwmCall::Commit { channel: 1 },
        ]
    );
}

#[test]
fn extend_commits_reverse_first() {
    let mut c = controller();
    c.apply(4, Motion::Retract).unwrap();
    let skip = c.pwm().writes().len();
    c.apply(4, Motion::Extend).unwrap();
    let writes = c.pwm().writes()[skip..].to_vec();
    assert_eq!(writes[2], PwmCall::Commit { channel: 7 });
    assert_eq!(writes[3], PwmCall::Commit { channel: 6 });
    assert!(!c.pwm().pair_overlap_seen);
}

#[test]
fn out_of_range_id_writes_nothing() {
    let mut c = controller();
    let before = c.pwm().writes().len();
    for id in [0, 5, 200] {
        assert_eq!(c.apply(id, Motion::Extend), Err(ActuatorError::InvalidActuatorId(id)));
    }
    assert_eq!(c.pwm().writes().len(), before);
}

#[test]
fn repeated_stop_is_idempotent() {
    let mut c = controller();
    c.apply(3, Motion::Extend).unwrap();
    for _ in 0..5 {
        c.apply(3, Motion::Stop).unwrap();
        assert_eq!((c.pwm().committed(4), c.pwm().committed(5)), (0, 0));
    }
}

#[test]
fn driver_failure_surfaces_as_pwm_error() {
    let mut pwm = MockPwm::new();
    pwm.fail_channel = Some(2);
    let mut c = ActuatorController::configure(pwm, &pins::ACTUATOR_GPIOS, 5_000, 12).unwrap();
    assert!(matches!(c.apply(2, Motion::Extend), Err(ActuatorError::Pwm(_))));
    assert!(c.apply(1, Motion::Extend).is_ok());
}

#[test]
fn fewer_wired_actuators_narrow_the_id_range() {
    let mut c =
        ActuatorController::configure(MockPwm::new(), &pins::ACTUATOR_GPIOS[..2], 5_000, 12)
            .unwrap();
    assert_eq!(c.actuator_count(), 2);
    assert!(c.apply(2, Motion::Extend).is_ok());
    assert_eq!(c.apply(3, Motion::Extend), Err(ActuatorError::InvalidActuatorId(3)));
}

#[test]
fn stop_releases_forward_when_reverse_write_fails() {
    let mut c =
        ActuatorController::configure(MockPwm::failing(1, 2), &pins::ACTUATOR_GPIOS, 5_000, 12)
            .unwrap();
    c.apply(1, Motion::Extend).unwrap();
    assert_eq!((c.pwm().committed(0), c.pwm().committed(1)), (4095, 0));

    assert!(matches!(c.apply(1, Motion::Stop), Err(ActuatorError::Pwm(_))));
    assert_eq!((c.pwm().committed(0), c.pwm().committed(1)), (0, 0));
}

#[test]
fn failed_reversal_still_releases_the_driven_side() {
    let mut c =
        ActuatorController::configure(MockPwm::failing(1, 2), &pins::ACTUATOR_GPIOS, 5_000, 12)
            .unwrap();
    c.apply(1, Motion::Extend).unwrap();

    assert!(c.apply(1, Motion::Retract).is_err());
    assert_eq!((c.pwm().committed(0), c.pwm().committed(1)), (0, 0));
    assert!(!c.pwm().pair_overlap_seen);
}
