#![allow(missing_docs)]
//! Host-level tests for the command scheduler: timing, queueing and counters.

use drive_envoy::command::CommandRequest;
use drive_envoy::command_queue::PendingCommand;
use drive_envoy::motion::MotionKind;
use drive_envoy::pwm_port::{PwmChannel, PwmOutput};
use drive_envoy::scheduler::{CommandScheduler, Outcome, TickEvent};
use embassy_time::Instant;

/// Remembers the last duty written to each channel.
#[derive(Default)]
struct RecordingPort {
    writes: Vec<(PwmChannel, u8)>,
    left_forward: u8,
    left_reverse: u8,
    right_forward: u8,
    right_reverse: u8,
}

impl RecordingPort {
    /// `[left forward, left reverse, right forward, right reverse]`
    fn duties(&self) -> [u8; 4] {
        [
            self.left_forward,
            self.left_reverse,
            self.right_forward,
            self.right_reverse,
        ]
    }
}

impl PwmOutput for RecordingPort {
    fn set_duty(&mut self, channel: PwmChannel, duty: u8) {
        self.writes.push((channel, duty));
        match channel {
            PwmChannel::LeftForward => self.left_forward = duty,
            PwmChannel::LeftReverse => self.left_reverse = duty,
            PwmChannel::RightForward => self.right_forward = duty,
            PwmChannel::RightReverse => self.right_reverse = duty,
        }
    }
}

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

fn scheduler() -> CommandScheduler<RecordingPort> {
    CommandScheduler::new(RecordingPort::default(), at(0))
}

#[test]
fn new_scheduler_zeroes_all_channels() {
    let scheduler = scheduler();
    assert_eq!(scheduler.port().writes.len(), 4);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert!(!scheduler.is_busy());
}

#[test]
fn command_from_stopped_executes_immediately() {
    let mut scheduler = scheduler();

    assert_eq!(
        scheduler.submit(MotionKind::Forward, 150, at(0)),
        Outcome::Executed
    );

    assert_eq!(scheduler.current().kind, MotionKind::Forward);
    assert_eq!(scheduler.current().speed, 150);
    assert_eq!(scheduler.port().duties(), [150, 0, 150, 0]);
    let stats = scheduler.statistics();
    assert_eq!(stats.total_received, 1);
    assert_eq!(stats.executed_immediately, 1);
    assert!(stats.is_conserved());
}

#[test]
fn forward_auto_stops_after_its_duration() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(1_000));

    assert_eq!(scheduler.on_tick(at(2_499)), TickEvent::Idle);
    assert_eq!(scheduler.current().kind, MotionKind::Forward);

    assert_eq!(scheduler.on_tick(at(2_500)), TickEvent::Completed);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert!(!scheduler.diagnostics().auto_stop_enabled);

    // Nothing left to stop.
    assert_eq!(scheduler.on_tick(at(5_000)), TickEvent::Idle);
}

#[test]
fn turns_auto_stop_after_400_ms() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Right, 120, at(3_000));

    assert_eq!(scheduler.on_tick(at(3_399)), TickEvent::Idle);
    assert_eq!(scheduler.on_tick(at(3_400)), TickEvent::Completed);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
}

#[test]
fn reversal_waits_out_the_dead_time() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));

    assert_eq!(
        scheduler.submit(MotionKind::Backward, 150, at(500)),
        Outcome::Deferred
    );

    // Stopped at t, nothing driven yet.
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert!(scheduler.diagnostics().waiting_for_change);
    assert_eq!(
        scheduler.deferred(),
        Some(PendingCommand::new(MotionKind::Backward, 150))
    );

    assert_eq!(scheduler.on_tick(at(649)), TickEvent::Idle);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);

    assert_eq!(
        scheduler.on_tick(at(650)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Backward, 150))
    );
    assert_eq!(scheduler.current().kind, MotionKind::Backward);
    assert_eq!(scheduler.current().started_at, at(650));
    assert_eq!(scheduler.port().duties(), [0, 150, 0, 150]);
    assert!(!scheduler.diagnostics().waiting_for_change);

    // The released motion gets its full duration.
    assert_eq!(scheduler.on_tick(at(2_149)), TickEvent::Idle);
    assert_eq!(scheduler.on_tick(at(2_150)), TickEvent::Completed);

    let stats = scheduler.statistics();
    assert_eq!(stats.total_received, 2);
    assert_eq!(stats.executed_immediately, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.reversals, 1);
    assert_eq!(stats.released, 1);
    assert!(stats.is_conserved());
}

#[test]
fn backward_to_forward_is_also_a_reversal() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Backward, 90, at(0));

    assert_eq!(
        scheduler.submit(MotionKind::Forward, 90, at(10)),
        Outcome::Deferred
    );
    assert_eq!(
        scheduler.on_tick(at(160)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Forward, 90))
    );
    assert_eq!(scheduler.port().duties(), [90, 0, 90, 0]);
}

#[test]
fn reversal_from_stopped_is_immediate() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    assert_eq!(scheduler.on_tick(at(1_500)), TickEvent::Completed);

    assert_eq!(
        scheduler.submit(MotionKind::Backward, 150, at(1_510)),
        Outcome::Executed
    );
    assert_eq!(scheduler.current().kind, MotionKind::Backward);
    assert_eq!(scheduler.statistics().reversals, 0);
}

#[test]
fn turns_never_engage_the_dead_time() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));

    assert_eq!(
        scheduler.submit(MotionKind::Left, 150, at(100)),
        Outcome::Queued
    );
    assert_eq!(
        scheduler.submit(MotionKind::Right, 150, at(110)),
        Outcome::Queued
    );
    assert!(!scheduler.diagnostics().waiting_for_change);
    assert_eq!(scheduler.statistics().reversals, 0);
    assert_eq!(scheduler.current().kind, MotionKind::Forward);
}

#[test]
fn commands_during_dead_time_are_queued_behind_it() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Backward, 150, at(100));

    assert_eq!(
        scheduler.submit(MotionKind::Left, 150, at(120)),
        Outcome::Queued
    );
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);

    assert_eq!(
        scheduler.on_tick(at(250)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Backward, 150))
    );
    assert_eq!(
        scheduler.on_tick(at(1_750)),
        TickEvent::Released(PendingCommand::new(MotionKind::Left, 150))
    );
    assert_eq!(scheduler.current().kind, MotionKind::Left);
}

#[test]
fn reversal_behind_queued_work_keeps_arrival_order() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Left, 150, at(10));

    assert_eq!(
        scheduler.submit(MotionKind::Backward, 150, at(20)),
        Outcome::Queued
    );
    assert_eq!(scheduler.current().kind, MotionKind::Forward);

    let queued: Vec<MotionKind> = scheduler.queued().map(|command| command.kind).collect();
    assert_eq!(queued, [MotionKind::Left, MotionKind::Backward]);
}

#[test]
fn queued_reversal_waits_out_the_dead_time_after_auto_stop() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Forward, 150, at(10));
    assert_eq!(
        scheduler.submit(MotionKind::Backward, 150, at(20)),
        Outcome::Queued
    );

    assert_eq!(
        scheduler.on_tick(at(1_500)),
        TickEvent::Released(PendingCommand::new(MotionKind::Forward, 150))
    );
    assert_eq!(
        scheduler.on_tick(at(3_000)),
        TickEvent::ReversalDeferred(PendingCommand::new(MotionKind::Backward, 150))
    );
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert!(scheduler.diagnostics().waiting_for_change);
    assert_eq!(scheduler.in_flight(), 1);

    assert_eq!(scheduler.on_tick(at(3_149)), TickEvent::Idle);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert_eq!(
        scheduler.on_tick(at(3_150)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Backward, 150))
    );
    assert_eq!(scheduler.current().kind, MotionKind::Backward);
    assert_eq!(scheduler.port().duties(), [0, 150, 0, 150]);

    let stats = scheduler.statistics();
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.reversals, 1);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.outstanding(), 0);
    assert!(stats.is_conserved());
}

#[test]
fn command_queued_behind_a_reversal_gets_its_own_dead_time() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    assert_eq!(
        scheduler.submit(MotionKind::Backward, 150, at(100)),
        Outcome::Deferred
    );
    assert_eq!(
        scheduler.submit(MotionKind::Forward, 150, at(110)),
        Outcome::Queued
    );

    assert_eq!(
        scheduler.on_tick(at(250)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Backward, 150))
    );
    assert_eq!(
        scheduler.on_tick(at(1_750)),
        TickEvent::ReversalDeferred(PendingCommand::new(MotionKind::Forward, 150))
    );
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);

    assert_eq!(scheduler.on_tick(at(1_899)), TickEvent::Idle);
    assert_eq!(
        scheduler.on_tick(at(1_900)),
        TickEvent::ReversalReleased(PendingCommand::new(MotionKind::Forward, 150))
    );
    assert_eq!(scheduler.port().duties(), [150, 0, 150, 0]);
    assert_eq!(scheduler.statistics().reversals, 2);
    assert!(scheduler.statistics().is_conserved());
}

#[test]
fn stop_discards_a_reversal_released_from_the_queue() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Backward, 150, at(10));
    scheduler.submit(MotionKind::Forward, 150, at(20));
    scheduler.on_tick(at(160));
    scheduler.on_tick(at(1_660));
    assert!(scheduler.deferred().is_some());

    scheduler.stop(at(1_700));
    assert_eq!(scheduler.deferred(), None);
    assert_eq!(scheduler.on_tick(at(2_000)), TickEvent::Idle);
    assert_eq!(scheduler.statistics().outstanding(), 0);
}

#[test]
fn tick_right_after_a_late_request_catches_up() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));

    // The request lands after the deadline but before any tick noticed it.
    assert_eq!(
        scheduler.submit(MotionKind::Left, 150, at(1_600)),
        Outcome::Queued
    );
    assert_eq!(
        scheduler.on_tick(at(1_600)),
        TickEvent::Released(PendingCommand::new(MotionKind::Left, 150))
    );
    assert_eq!(scheduler.on_tick(at(1_600)), TickEvent::Idle);
    assert_eq!(scheduler.current().kind, MotionKind::Left);
}

#[test]
fn burst_of_six_rejects_the_last() {
    let mut scheduler = scheduler();
    let burst = [
        MotionKind::Forward,
        MotionKind::Left,
        MotionKind::Right,
        MotionKind::Left,
        MotionKind::Right,
        MotionKind::Left,
    ];

    let outcomes: Vec<Outcome> = burst
        .into_iter()
        .zip(0..)
        .map(|(kind, ms)| scheduler.submit(kind, 150, at(ms)))
        .collect();

    assert_eq!(
        outcomes,
        [
            Outcome::Executed,
            Outcome::Queued,
            Outcome::Queued,
            Outcome::Queued,
            Outcome::Queued,
            Outcome::Rejected,
        ]
    );
    let stats = scheduler.statistics();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.total_received, 6);
    assert!(stats.is_conserved());
}

#[test]
fn overflow_rejects_exactly_the_excess_and_keeps_order() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 100, at(0));

    let outcomes: Vec<Outcome> = (1..=8)
        .map(|speed| scheduler.submit(MotionKind::Left, speed, at(10)))
        .collect();

    // Nine commands against a limit of five in flight.
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Rejected).count(),
        4
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Queued).count(),
        4
    );
    assert_eq!(scheduler.statistics().dropped, 4);
    assert_eq!(scheduler.queue_len(), 4);
    assert_eq!(scheduler.in_flight(), 5);

    // Retained entries come out oldest first, one per completed motion.
    let mut now = 1_500;
    for speed in 1..=4 {
        assert_eq!(
            scheduler.on_tick(at(now)),
            TickEvent::Released(PendingCommand::new(MotionKind::Left, speed))
        );
        now += 400;
    }
    assert_eq!(scheduler.on_tick(at(now)), TickEvent::Completed);
    assert_eq!(scheduler.queue_len(), 0);

    let stats = scheduler.statistics();
    assert_eq!(stats.total_received, 9);
    assert_eq!(stats.executed_immediately, 1);
    assert_eq!(stats.queued, 4);
    assert_eq!(stats.released, 4);
    assert!(stats.is_conserved());
}

#[test]
fn smaller_capacity_via_const_generic() {
    let mut scheduler: CommandScheduler<RecordingPort, 2> =
        CommandScheduler::new(RecordingPort::default(), at(0));

    assert_eq!(scheduler.submit(MotionKind::Left, 150, at(0)), Outcome::Executed);
    assert_eq!(scheduler.submit(MotionKind::Left, 150, at(1)), Outcome::Queued);
    assert_eq!(scheduler.submit(MotionKind::Left, 150, at(2)), Outcome::Rejected);
    assert_eq!(scheduler.diagnostics().queue_capacity, 2);
}

#[test]
fn stop_wins_and_discards_waiting_work() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Left, 150, at(10));
    scheduler.submit(MotionKind::Right, 150, at(20));

    assert_eq!(scheduler.stop(at(300)), Outcome::Executed);

    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().duties(), [0, 0, 0, 0]);
    assert_eq!(scheduler.queue_len(), 0);
    // The old auto-stop deadline is gone along with the queue.
    assert_eq!(scheduler.on_tick(at(1_500)), TickEvent::Idle);

    let stats = scheduler.statistics();
    assert_eq!(stats.total_received, 4);
    assert_eq!(stats.executed_immediately, 2);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.outstanding(), 0);
    assert!(stats.is_conserved());
}

#[test]
fn stop_cancels_a_pending_reversal() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Backward, 150, at(100));

    assert_eq!(scheduler.stop(at(120)), Outcome::Executed);

    assert_eq!(scheduler.deferred(), None);
    assert!(!scheduler.diagnostics().waiting_for_change);
    assert_eq!(scheduler.on_tick(at(250)), TickEvent::Idle);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.statistics().discarded, 1);
}

#[test]
fn stop_is_idempotent() {
    let mut scheduler = scheduler();

    assert_eq!(scheduler.stop(at(0)), Outcome::Executed);
    assert_eq!(scheduler.stop(at(1)), Outcome::Executed);

    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
    assert_eq!(scheduler.port().writes.len(), 12);
    assert!(scheduler.port().writes.iter().all(|(_, duty)| *duty == 0));
    let stats = scheduler.statistics();
    assert_eq!(stats.executed_immediately, 2);
    assert_eq!(stats.discarded, 0);
    assert!(stats.is_conserved());
}

#[test]
fn missing_speed_uses_the_default() {
    let mut scheduler = scheduler();
    scheduler.set_default_speed(90);
    assert_eq!(scheduler.statistics().total_received, 0);

    let reply = scheduler.submit_request(&CommandRequest::new(MotionKind::Forward, None), at(0));

    assert_eq!(reply.outcome, Outcome::Executed);
    assert_eq!(reply.action, MotionKind::Forward);
    assert_eq!(reply.default_speed, 90);
    assert_eq!(scheduler.port().duties(), [90, 0, 90, 0]);

    let reply =
        scheduler.submit_request(&CommandRequest::new(MotionKind::Left, Some(200)), at(5));
    assert_eq!(reply.outcome, Outcome::Queued);
    assert_eq!(reply.queue_depth, 1);
    assert_eq!(reply.dropped, 0);
}

#[test]
fn setting_speed_leaves_motion_alone() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Left, 150, at(1));
    let before = scheduler.diagnostics();

    scheduler.set_default_speed(42);

    let after = scheduler.diagnostics();
    assert_eq!(after.default_speed, 42);
    assert_eq!(after.stats, before.stats);
    assert_eq!(after.queue_size, before.queue_size);
    assert_eq!(after.current_state, MotionKind::Forward);
    assert_eq!(scheduler.port().duties(), [150, 0, 150, 0]);
}

#[test]
fn diagnostics_reflect_current_state() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(0));
    scheduler.submit(MotionKind::Left, 150, at(1));

    let diagnostics = scheduler.diagnostics();
    assert_eq!(diagnostics.current_state, MotionKind::Forward);
    assert_eq!(diagnostics.queue_size, 1);
    assert_eq!(diagnostics.queue_capacity, 5);
    assert!(diagnostics.auto_stop_enabled);
    assert!(!diagnostics.waiting_for_change);
    assert_eq!(diagnostics.default_speed, 150);

    // Reading is side-effect free.
    assert_eq!(scheduler.diagnostics(), diagnostics);
}

#[test]
fn deadline_past_end_of_clock_never_fires() {
    let start = Instant::from_ticks(u64::MAX - 5);
    let mut scheduler: CommandScheduler<RecordingPort> =
        CommandScheduler::new(RecordingPort::default(), start);

    assert_eq!(
        scheduler.submit(MotionKind::Forward, 150, start),
        Outcome::Executed
    );
    assert_eq!(scheduler.current().deadline(), Some(Instant::MAX));
    assert_eq!(
        scheduler.on_tick(Instant::from_ticks(u64::MAX - 1)),
        TickEvent::Idle
    );
    assert_eq!(scheduler.current().kind, MotionKind::Forward);

    // Stop still works.
    assert_eq!(scheduler.stop(start), Outcome::Executed);
    assert_eq!(scheduler.current().kind, MotionKind::Stopped);
}

#[test]
fn clock_jumping_backwards_is_harmless() {
    let mut scheduler = scheduler();
    scheduler.submit(MotionKind::Forward, 150, at(1_000));

    assert_eq!(scheduler.on_tick(at(500)), TickEvent::Idle);
    assert_eq!(scheduler.current().kind, MotionKind::Forward);
    assert_eq!(scheduler.on_tick(at(2_500)), TickEvent::Completed);
}

#[test]
fn counters_are_conserved_through_a_mixed_session() {
    let mut scheduler = scheduler();
    let script = [
        (MotionKind::Forward, 0),
        (MotionKind::Backward, 100),
        (MotionKind::Left, 120),
        (MotionKind::Right, 130),
        (MotionKind::Forward, 140),
        (MotionKind::Left, 150),
        (MotionKind::Right, 160),
        (MotionKind::Stopped, 170),
        (MotionKind::Right, 200),
        (MotionKind::Left, 210),
    ];

    for (kind, ms) in script {
        scheduler.submit(kind, 150, at(ms));
        assert!(scheduler.statistics().is_conserved());
        for tick in (ms..ms + 50).step_by(10) {
            scheduler.on_tick(at(tick));
            assert!(scheduler.statistics().is_conserved());
        }
    }
    assert_eq!(scheduler.statistics().total_received, 10);
}
