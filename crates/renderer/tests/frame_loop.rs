mod common;

use std::time::Duration;

use frameloop_core::SurfaceExtent;
use frameloop_renderer::{
    Acquired, ErrorKind, FrameError, FrameOrchestrator, FrameState, SlotId, SurfaceStatus,
    TargetHandle, TickOutcome,
};

use common::{Event, MockRecorder, MockUpdater, TestOrchestrator};

fn tick(orchestrator: &mut TestOrchestrator, surface: &mut common::MockSurface) -> TickOutcome {
    orchestrator
        .tick(surface, Duration::from_millis(16))
        .expect("tick")
}

fn fence_id(orchestrator: &TestOrchestrator, slot: usize) -> u64 {
    orchestrator.slots().slot(SlotId(slot)).fence().id
}

/// Fence of every submit, in order.
fn submitted_fences(state: &common::Shared) -> Vec<u64> {
    state
        .borrow()
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Submit { fence, .. } => Some(*fence),
            _ => None,
        })
        .collect()
}

#[test]
fn test_cpu_never_runs_more_than_slot_count_ahead() {
    for slots in 1..=3 {
        let (mut orchestrator, mut surface, state) = common::orchestrator(slots, 4);
        for _ in 0..12 {
            assert_eq!(tick(&mut orchestrator, &mut surface), TickOutcome::Presented);
            assert!(state.borrow().pending() <= slots);
        }

        let state = state.borrow();
        assert_eq!(state.max_pending, slots);
        assert!(state.violations.is_empty(), "{:?}", state.violations);
    }
}

#[test]
fn test_backpressure_holds_across_recreation() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    {
        let mut state = state.borrow_mut();
        state.present_script.extend([
            SurfaceStatus::Optimal,
            SurfaceStatus::Optimal,
            SurfaceStatus::Suboptimal,
            SurfaceStatus::Optimal,
            SurfaceStatus::OutOfDate,
        ]);
    }

    let outcomes: Vec<_> = (0..8)
        .map(|_| tick(&mut orchestrator, &mut surface))
        .collect();
    assert_eq!(outcomes[2], TickOutcome::PresentedAndRecreated);
    assert_eq!(outcomes[4], TickOutcome::PresentedAndRecreated);
    assert_eq!(orchestrator.generation(), 3);

    let state = state.borrow();
    assert!(state.max_pending <= 2);
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_claiming_a_busy_target_waits_for_its_claimant() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    state.borrow_mut().acquire_script.extend([
        Acquired {
            index: 0,
            status: SurfaceStatus::Optimal,
        };
        4
    ]);
    let target = TargetHandle::new(0, orchestrator.generation());

    for frame in 0..4 {
        tick(&mut orchestrator, &mut surface);
        let claimant = orchestrator.resources().claimant(target).expect("claimant");
        assert_eq!(claimant, Some(SlotId(frame % 2)));
    }

    // The second frame reuses target 0 from the other slot, so slot 0's
    // fence must be waited on between the two submits.
    let f0 = fence_id(&orchestrator, 0);
    let f1 = fence_id(&orchestrator, 1);
    let state = state.borrow();
    let submit = |fence| {
        state
            .events
            .iter()
            .position(|e| matches!(e, Event::Submit { fence: f, .. } if *f == fence))
            .expect("submit")
    };
    let (first, second) = (submit(f0), submit(f1));
    assert!(
        state.events[first..second].contains(&Event::WaitFence(f0)),
        "slot 1 claimed target 0 without waiting for slot 0"
    );
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_uniforms_written_only_after_claimant_finishes() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(3, 2);
    state.borrow_mut().acquire_script.extend([
        Acquired {
            index: 1,
            status: SurfaceStatus::Optimal,
        };
        3
    ]);
    for _ in 0..3 {
        tick(&mut orchestrator, &mut surface);
    }

    let state = state.borrow();
    assert_eq!(state.count(|e| matches!(e, Event::WriteUniforms { target: 1 })), 3);
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_out_of_date_acquire_skips_submit_and_present() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    assert_eq!(tick(&mut orchestrator, &mut surface), TickOutcome::Presented);

    state.borrow_mut().acquire_script.push_back(Acquired {
        index: 0,
        status: SurfaceStatus::OutOfDate,
    });
    let mark = state.borrow().events.len();
    let frame_index = orchestrator.frame_index();
    let frame_number = orchestrator.frame_number();

    assert_eq!(
        tick(&mut orchestrator, &mut surface),
        TickOutcome::SkippedOutOfDate
    );
    {
        let state = state.borrow();
        let events = &state.events[mark..];
        assert!(!events.iter().any(|e| matches!(
            e,
            Event::Submit { .. } | Event::Present { .. } | Event::WriteUniforms { .. }
        )));
        assert!(events.contains(&Event::WaitIdle));
    }
    assert_eq!(orchestrator.frame_index(), frame_index);
    assert_eq!(orchestrator.frame_number(), frame_number);
    assert_eq!(orchestrator.generation(), 2);
    assert_eq!(orchestrator.state(), FrameState::Idle);

    assert_eq!(tick(&mut orchestrator, &mut surface), TickOutcome::Presented);
}

#[test]
fn test_resize_is_picked_up_within_one_tick() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    assert_eq!(orchestrator.extent(), SurfaceExtent::new(800, 600));
    assert_eq!(tick(&mut orchestrator, &mut surface), TickOutcome::Presented);

    surface.resize(400, 300);
    let mark = state.borrow().events.len();
    assert_eq!(
        tick(&mut orchestrator, &mut surface),
        TickOutcome::PresentedAndRecreated
    );

    assert_eq!(orchestrator.extent(), SurfaceExtent::new(400, 300));
    let targets = orchestrator.resources().targets().expect("targets");
    assert_eq!(targets.extent(), SurfaceExtent::new(400, 300));
    assert_eq!(targets.generation(), 2);
    // The frame in flight when the resize landed was still presented.
    assert_eq!(
        state.borrow().count(|e| matches!(e, Event::Present { .. })),
        2
    );
    assert!(state.borrow().created_kinds(mark).contains(&"targets"));
    assert!(!surface.resized.is_raised());
}

#[test]
fn test_slots_reused_round_robin_after_fence_wait() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 5);
    for _ in 0..6 {
        assert_eq!(tick(&mut orchestrator, &mut surface), TickOutcome::Presented);
    }

    let fences = [fence_id(&orchestrator, 0), fence_id(&orchestrator, 1)];
    let submitted = submitted_fences(&state);
    assert_eq!(submitted.len(), 6);
    for (frame, fence) in submitted.iter().enumerate() {
        assert_eq!(*fence, fences[frame % 2], "frame {} used the wrong slot", frame);
    }

    // Every submit on a fence is preceded by a wait on it since its last use.
    let state = state.borrow();
    let mut last_submit = [0usize; 2];
    for (i, event) in state.events.iter().enumerate() {
        let Event::Submit { fence, .. } = event else {
            continue;
        };
        let slot = fences.iter().position(|f| f == fence).expect("slot fence");
        assert!(
            state.events[last_submit[slot]..i].contains(&Event::WaitFence(*fence)),
            "slot {} reused without waiting on its fence",
            slot
        );
        last_submit[slot] = i;
    }
    assert_eq!(orchestrator.frame_index(), 0);
    assert_eq!(orchestrator.frame_number(), 6);
}

#[test]
fn test_suboptimal_acquire_presents_then_recreates() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    state.borrow_mut().acquire_script.push_back(Acquired {
        index: 2,
        status: SurfaceStatus::Suboptimal,
    });

    assert_eq!(
        tick(&mut orchestrator, &mut surface),
        TickOutcome::PresentedAndRecreated
    );
    assert_eq!(orchestrator.generation(), 2);
    assert!(state.borrow().events.contains(&Event::Present { target: 2 }));
}

#[test]
fn test_updater_sees_each_frame() {
    let (mut orchestrator, mut surface, _state) = common::orchestrator(2, 3);
    for _ in 0..4 {
        tick(&mut orchestrator, &mut surface);
    }

    let generation = orchestrator.generation();
    let frames = &orchestrator.updater_mut().frames;
    assert_eq!(frames.len(), 4);
    for (n, ctx) in frames.iter().enumerate() {
        assert_eq!(ctx.frame_number, n as u64);
        assert_eq!(ctx.target, TargetHandle::new(n as u32 % 3, generation));
        assert_eq!(ctx.extent, SurfaceExtent::new(800, 600));
        assert_eq!(ctx.elapsed, Duration::from_millis(16));
    }
}

#[test]
fn test_zero_slots_rejected() {
    let (backend, mut surface, _state) = common::setup(3);
    let result = FrameOrchestrator::new(
        backend,
        MockRecorder::default(),
        MockUpdater::default(),
        common::config(0),
        &mut surface,
    );
    assert!(matches!(result, Err(FrameError::ZeroSlots)));
}

#[test]
fn test_submit_failure_is_reported_and_shutdown_is_clean() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    tick(&mut orchestrator, &mut surface);

    state.borrow_mut().fail_on = Some("submit");
    let err = orchestrator
        .tick(&mut surface, Duration::ZERO)
        .expect_err("submit should fail");
    assert!(matches!(err, FrameError::Backend { op: "submit", .. }));
    assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    assert_eq!(orchestrator.state(), FrameState::Submitting);

    // The failed slot's fence was reset and will never signal.
    drop(orchestrator);
    let state = state.borrow();
    assert!(state.violations.is_empty(), "{:?}", state.violations);
    assert!(state.live.is_empty());
}

#[test]
fn test_device_loss_on_present_is_a_device_error() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    state.borrow_mut().device_lost_on = Some("present");

    let err = orchestrator
        .tick(&mut surface, Duration::ZERO)
        .expect_err("present should fail");
    assert_eq!(err.kind(), ErrorKind::Device);
    assert!(err.to_string().starts_with("present failed"));
}

#[test]
fn test_acquired_index_out_of_range_is_a_contract_violation() {
    let (mut orchestrator, mut surface, state) = common::orchestrator(2, 3);
    state.borrow_mut().acquire_script.push_back(Acquired {
        index: 7,
        status: SurfaceStatus::Optimal,
    });

    let err = orchestrator
        .tick(&mut surface, Duration::ZERO)
        .expect_err("index 7 does not exist");
    assert!(matches!(err, FrameError::StaleTarget { .. }));
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
    assert_eq!(state.borrow().count(|e| matches!(e, Event::Submit { .. })), 0);
}
