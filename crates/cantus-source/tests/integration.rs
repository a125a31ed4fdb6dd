//! Integration tests for cantus-source.
//!
//! These tests drive whole sources through the public API: metadata, saved
//! state, playback reads, capture and cloning.

use std::collections::HashSet;
use std::sync::Arc;

use approx::assert_relative_eq;
use crossbeam_channel::Receiver;

use cantus_core::{Session, TimePos, MAX_BEATS};
use cantus_midi::{
    capture_channel, AutoState, Event, InterpolationStyle, MidiBuffer, Parameter, RawMidiEvent,
};
use cantus_source::{
    CaptureCount, MidiCursor, MidiModel, MidiSource, MidiStorage, SmfStorage, SourceEvent,
    SourceFlags, StateNode, StuckNotePolicy,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn session() -> Arc<Session> {
    Arc::new(Session::default())
}

fn source(name: &str) -> MidiSource {
    MidiSource::new(session(), name, SourceFlags::CAPTURE)
}

fn source_with_events(name: &str, events: Vec<Event<f64>>) -> MidiSource {
    let src = source(name);
    src.set_model(
        &mut src.write_lock(),
        MidiModel::from_events(events).into_shared(),
    );
    src
}

fn drain(rx: &Receiver<SourceEvent>) -> Vec<SourceEvent> {
    rx.try_iter().collect()
}

fn count_model_changed(events: &[SourceEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SourceEvent::ModelChanged))
        .count()
}

fn read(
    src: &MidiSource,
    out: &mut MidiBuffer<u64>,
    cursor: &mut MidiCursor,
    start: f64,
    cnt: f64,
) -> TimePos {
    src.midi_read(
        &src.read_lock(),
        out,
        TimePos::ZERO,
        TimePos::Beats(start),
        TimePos::Beats(cnt),
        None,
        cursor,
        None,
        None,
        &HashSet::new(),
    )
}

fn seeks(src: &MidiSource) -> usize {
    src.read_lock().model().map(|m| m.read().seeks()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// 1-3. Parameter metadata
// ---------------------------------------------------------------------------

#[test]
fn test_unset_parameters_report_defaults() {
    let src = source("meta");
    let lock = src.read_lock();

    let params = [
        (Parameter::controller(0, 7), InterpolationStyle::Linear),
        (Parameter::controller(4, 0), InterpolationStyle::Discrete),
        (Parameter::controller(15, 64), InterpolationStyle::Discrete),
        (Parameter::controller(2, 121), InterpolationStyle::Discrete),
        (Parameter::program_change(1), InterpolationStyle::Discrete),
        (Parameter::channel_pressure(3), InterpolationStyle::Linear),
        (Parameter::note_pressure(0, 60), InterpolationStyle::Linear),
        (Parameter::pitch_bend(9), InterpolationStyle::Linear),
    ];
    for (p, style) in params {
        assert_eq!(lock.interpolation_of(&p), style, "{}", p);
        assert_eq!(lock.automation_state_of(&p), AutoState::Play, "{}", p);
    }
}

#[test]
fn test_setting_effective_value_is_silent() {
    let src = source("meta");
    let rx = src.subscribe();
    let p = Parameter::controller(0, 7);

    let mut lock = src.write_lock();
    src.set_interpolation_of(&mut lock, p, InterpolationStyle::Linear);
    src.set_automation_state_of(&mut lock, p, AutoState::Play);
    assert!(drain(&rx).is_empty());
    assert!(lock.interpolation_overrides().is_empty());

    src.set_automation_state_of(&mut lock, p, AutoState::Touch);
    src.set_automation_state_of(&mut lock, p, AutoState::Touch);
    assert_eq!(
        drain(&rx),
        vec![SourceEvent::AutomationStateChanged {
            parameter: p,
            state: AutoState::Touch
        }]
    );
}

#[test]
fn test_setting_default_removes_override() {
    let src = source("meta");
    let rx = src.subscribe();
    let bend = Parameter::pitch_bend(0);
    let pgm = Parameter::program_change(0);

    let mut lock = src.write_lock();
    src.set_interpolation_of(&mut lock, bend, InterpolationStyle::Discrete);
    src.set_interpolation_of(&mut lock, pgm, InterpolationStyle::Linear);
    assert_eq!(lock.interpolation_overrides().len(), 2);

    src.set_interpolation_of(&mut lock, bend, InterpolationStyle::Linear);
    assert_eq!(lock.interpolation_overrides().len(), 1);
    assert!(!lock.interpolation_overrides().contains_key(&bend));

    // already the default: no growth, no event
    src.set_interpolation_of(&mut lock, bend, InterpolationStyle::Linear);
    assert_eq!(lock.interpolation_overrides().len(), 1);

    let events = drain(&rx);
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[2],
        SourceEvent::InterpolationChanged {
            parameter: bend,
            style: InterpolationStyle::Linear
        }
    );
}

#[test]
fn test_bulk_copy_emits_no_notifications() {
    let a = source("a");
    let b = source("b");
    {
        let mut lock = a.write_lock();
        a.set_interpolation_of(&mut lock, Parameter::controller(0, 1), InterpolationStyle::Discrete);
        a.set_automation_state_of(&mut lock, Parameter::controller(0, 1), AutoState::Write);
    }

    let rx = b.subscribe();
    let a_lock = a.read_lock();
    let mut b_lock = b.write_lock();
    b.copy_interpolation_from(&mut b_lock, &a_lock);
    b.copy_automation_state_from(&mut b_lock, &a_lock);

    assert_eq!(b_lock.interpolation_overrides(), a_lock.interpolation_overrides());
    assert_eq!(b_lock.automation_overrides(), a_lock.automation_overrides());
    assert!(drain(&rx).is_empty());
}

// ---------------------------------------------------------------------------
// 4-5. Saved state
// ---------------------------------------------------------------------------

#[test]
fn test_state_round_trip_preserves_overrides() {
    let src = source("saved");
    let cc1 = Parameter::controller(0, 1);
    let sustain = Parameter::controller(0, 64);
    let bend = Parameter::pitch_bend(3);
    let aftertouch = Parameter::note_pressure(2, 61);
    {
        let mut lock = src.write_lock();
        src.set_captured_for(&mut lock, "MIDI 1");
        src.set_interpolation_of(&mut lock, cc1, InterpolationStyle::Discrete);
        src.set_interpolation_of(&mut lock, sustain, InterpolationStyle::Linear);
        // set and reset: must not survive
        src.set_interpolation_of(&mut lock, bend, InterpolationStyle::Discrete);
        src.set_interpolation_of(&mut lock, bend, InterpolationStyle::Linear);
        src.set_automation_state_of(&mut lock, aftertouch, AutoState::Off);
        src.set_automation_state_of(&mut lock, cc1, AutoState::Latch);
    }

    let node = src.get_state(&src.read_lock());
    assert_eq!(node.children().len(), 4);

    // push it through a real serializer on the way
    let json = serde_json::to_string(&node).unwrap();
    let node: StateNode = serde_json::from_str(&json).unwrap();

    let restored =
        MidiSource::from_state(session(), &node, Box::new(SmfStorage::in_memory())).unwrap();
    let original = src.read_lock();
    let lock = restored.read_lock();

    assert_eq!(lock.captured_for(), "MIDI 1");
    assert_eq!(lock.interpolation_overrides(), original.interpolation_overrides());
    assert_eq!(lock.automation_overrides(), original.automation_overrides());
    assert!(!lock.interpolation_overrides().contains_key(&bend));
    assert!(!lock.automation_overrides().contains_key(&sustain));
    assert_eq!(lock.interpolation_of(&bend), InterpolationStyle::Linear);
}

#[test]
fn test_legacy_empty_values() {
    init_tracing();
    let mut node = StateNode::new("Source").with_property("name", "legacy");
    node.add_child(
        StateNode::new("InterpolationStyle")
            .with_property("parameter", "midicc-0-7")
            .with_property("style", ""),
    );
    node.add_child(
        StateNode::new("InterpolationStyle")
            .with_property("parameter", "midi-pgm-change-0")
            .with_property("style", ""),
    );
    node.add_child(
        StateNode::new("AutomationState")
            .with_property("parameter", "midi-pitch-bender-0")
            .with_property("state", ""),
    );

    let src = MidiSource::from_state(session(), &node, Box::new(SmfStorage::in_memory())).unwrap();
    let lock = src.read_lock();

    assert_eq!(
        lock.interpolation_of(&Parameter::controller(0, 7)),
        InterpolationStyle::Discrete
    );
    assert_eq!(
        lock.interpolation_of(&Parameter::program_change(0)),
        InterpolationStyle::Linear
    );
    assert_eq!(
        lock.automation_state_of(&Parameter::pitch_bend(0)),
        AutoState::Off
    );
}

#[test]
fn test_malformed_state_fails_construction() {
    init_tracing();
    let mut node = StateNode::new("Source").with_property("name", "broken");
    node.add_child(StateNode::new("AutomationState").with_property("state", "Play"));

    let result = MidiSource::from_state(session(), &node, Box::new(SmfStorage::in_memory()));
    assert!(matches!(
        result,
        Err(cantus_source::Error::MissingProperty {
            node: "AutomationState",
            property: "parameter"
        })
    ));
}

// ---------------------------------------------------------------------------
// 6-8. Playback reads
// ---------------------------------------------------------------------------

#[test]
fn test_read_window_selects_events() {
    let src = source_with_events(
        "window",
        vec![
            Event::note_on(0.0, 0, 60, 100),
            Event::note_on(1.0, 0, 62, 100),
            Event::note_on(2.5, 0, 64, 100),
            Event::note_on(4.0, 0, 65, 100),
        ],
    );
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    let covered = read(&src, &mut out, &mut cursor, 1.0, 2.0);

    assert_eq!(covered, TimePos::Beats(2.0));
    // 120 BPM at 48 kHz: one beat is 24000 samples
    assert_eq!(out.times(), vec![24000, 60000]);
    assert_eq!(out.events()[0].note(), Some(62));
    assert_eq!(out.events()[1].note(), Some(64));
    // parked on the 4.0 event
    assert_eq!(cursor.position(), Some(3));
    assert_eq!(cursor.last_read_end(), Some(TimePos::Beats(3.0)));
}

#[test]
fn test_contiguous_reads_do_not_reseek() {
    let events = (0..16)
        .map(|i| Event::note_on(i as f64 * 0.25, 0, 60 + i as u8, 100))
        .collect();
    let src = source_with_events("linear", events);
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    read(&src, &mut out, &mut cursor, 0.0, 2.0);
    assert_eq!(seeks(&src), 1);
    assert_eq!(cursor.position(), Some(8));

    read(&src, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(seeks(&src), 1);
    assert_eq!(out.len(), 16);

    // a jump is not a continuation
    read(&src, &mut out, &mut cursor, 1.0, 1.0);
    assert_eq!(seeks(&src), 2);
}

#[test]
fn test_write_completion_forces_cursor_resync() {
    let src = source_with_events(
        "resync",
        vec![
            Event::note_on(0.5, 0, 60, 100),
            Event::note_off(2.5, 0, 60, 0),
        ],
    );
    let rx = src.subscribe();
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    read(&src, &mut out, &mut cursor, 0.0, 2.0);
    assert_eq!(seeks(&src), 1);

    {
        let mut lock = src.write_lock();
        src.mark_write_started(&mut lock);
        src.mark_write_completed(
            &mut lock,
            StuckNotePolicy::ResolveStuckNotes,
            TimePos::Beats(4.0),
        );
    }
    assert!(drain(&rx)
        .iter()
        .any(|e| matches!(e, SourceEvent::Invalidated { .. })));

    // same start as the last read end, but the cursor must not trust its position
    assert_eq!(cursor.last_read_end(), Some(TimePos::Beats(2.0)));
    read(&src, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(seeks(&src), 2);
    assert_eq!(out.len(), 2);
}

#[test]
fn test_model_edit_forces_cursor_resync() {
    let src = source_with_events("edit", vec![Event::note_on(3.0, 0, 60, 100)]);
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    read(&src, &mut out, &mut cursor, 0.0, 2.0);
    src.read_lock()
        .model()
        .unwrap()
        .write()
        .insert_event(Event::note_on(2.5, 0, 62, 100));

    read(&src, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(seeks(&src), 2);
    assert_eq!(out.times(), vec![60000, 72000]);
}

#[test]
fn test_model_swap_forces_cursor_resync() {
    let events = || {
        vec![
            Event::note_on(0.5, 0, 60, 100),
            Event::note_on(2.5, 0, 62, 100),
        ]
    };
    let src = source_with_events("swap", events());
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    read(&src, &mut out, &mut cursor, 0.0, 2.0);
    assert_eq!(seeks(&src), 1);

    // same contents and revision, different model
    let replacement = MidiModel::from_events(events()).into_shared();
    src.set_model(&mut src.write_lock(), replacement.clone());
    read(&src, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(replacement.read().seeks(), 1);
    assert_eq!(out.times(), vec![12000, 60000]);

    // detaching and reattaching the very same model still invalidates
    src.drop_model(&mut src.write_lock());
    src.set_model(&mut src.write_lock(), replacement.clone());
    read(&src, &mut out, &mut cursor, 4.0, 2.0);
    assert_eq!(replacement.read().seeks(), 2);
}

#[test]
fn test_forced_reload_forces_cursor_resync() {
    let src = MidiSource::with_storage(
        session(),
        "reload",
        SourceFlags::CAPTURE,
        Box::new(SmfStorage::with_events(vec![Event::note_on(3.0, 0, 60, 100)])),
    );
    src.load_model(&mut src.write_lock(), false);
    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();

    read(&src, &mut out, &mut cursor, 0.0, 2.0);
    assert_eq!(seeks(&src), 1);

    src.load_model(&mut src.write_lock(), true);
    read(&src, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(seeks(&src), 2);
    assert_eq!(out.times(), vec![72000]);
}

#[test]
fn test_cursor_does_not_resume_on_twin_source() {
    let node = StateNode::new("Source")
        .with_property("name", "twin")
        .with_property("id", 424242u64);
    let events = || {
        (0..8)
            .map(|i| Event::note_on(i as f64 * 0.5, 0, 60 + i as u8, 100))
            .collect::<Vec<_>>()
    };
    let a = MidiSource::from_state(session(), &node, Box::new(SmfStorage::in_memory())).unwrap();
    let b = MidiSource::from_state(session(), &node, Box::new(SmfStorage::in_memory())).unwrap();
    assert_eq!(a.id(), b.id());
    a.set_model(&mut a.write_lock(), MidiModel::from_events(events()).into_shared());
    b.set_model(&mut b.write_lock(), MidiModel::from_events(events()).into_shared());

    let mut out = MidiBuffer::new();
    let mut cursor = MidiCursor::new();
    read(&a, &mut out, &mut cursor, 0.0, 2.0);
    assert_eq!(cursor.position(), Some(4));

    // same id, generation and revision: only the object differs
    read(&b, &mut out, &mut cursor, 2.0, 2.0);
    assert_eq!(seeks(&b), 1);
    assert_eq!(out.len(), 8);
}

// ---------------------------------------------------------------------------
// 9. Capture length
// ---------------------------------------------------------------------------

#[test]
fn test_capture_length_accounting() {
    let src = source("capture");
    let rx_events = src.subscribe();
    let (mut tx, mut ring) = capture_channel();
    tx.push(RawMidiEvent::new(10, [0x90, 60, 100], 3));
    tx.push(RawMidiEvent::new(600, [0x80, 60, 0], 3));

    let mut lock = src.write_lock();
    src.mark_write_starting_now(&mut lock, TimePos::ZERO, 0);

    let written = src.midi_write(&mut lock, &mut ring, TimePos::ZERO, CaptureCount::Samples(512));
    assert_eq!(written, 512);
    assert_eq!(lock.capture_length(), 512);
    assert!(drain(&rx_events).is_empty());

    src.midi_write(&mut lock, &mut ring, TimePos::Samples(512), CaptureCount::Unbounded);
    assert_eq!(lock.capture_length(), 512);
    assert_eq!(lock.storage().len(), 2);
    assert_eq!(
        drain(&rx_events),
        vec![SourceEvent::Invalidated {
            transport_rolling: false
        }]
    );
}

#[test]
fn test_write_start_anchors_length_in_beats() {
    let src = source("anchored");
    let mut lock = src.write_lock();

    src.mark_write_starting_now(&mut lock, TimePos::Samples(24000), 36000);

    assert_eq!(lock.natural_position(), TimePos::Samples(24000));
    assert_eq!(lock.capture_length(), 36000);
    match lock.length() {
        TimePos::Beats(beats) => assert_relative_eq!(beats, 1.5),
        other => panic!("expected a beat length, got {}", other),
    }
}

#[test]
fn test_capture_before_natural_position_is_dropped() {
    init_tracing();
    let src = source("late start");
    let (mut tx, mut ring) = capture_channel();
    tx.push(RawMidiEvent::new(100, [0x90, 60, 100], 3));
    tx.push(RawMidiEvent::new(36000, [0x90, 62, 100], 3));

    let mut lock = src.write_lock();
    src.set_model(&mut lock, MidiModel::new().into_shared());
    src.mark_write_started(&mut lock);
    src.mark_write_starting_now(&mut lock, TimePos::Samples(24000), 0);
    src.midi_write(&mut lock, &mut ring, TimePos::ZERO, CaptureCount::Samples(48000));

    let stored: Vec<f64> = lock.storage().events().iter().map(|e| e.time()).collect();
    assert_eq!(stored.len(), 1);
    assert_relative_eq!(stored[0], 0.5);

    let model = lock.model().unwrap().read();
    assert_eq!(model.len(), 1);
    assert_eq!(model.events()[0].note(), Some(62));
}

// ---------------------------------------------------------------------------
// 10. Clone and export
// ---------------------------------------------------------------------------

fn clone_fixture() -> MidiSource {
    let src = source_with_events(
        "original",
        vec![
            Event::note_on(0.0, 0, 60, 100),
            Event::note_off(0.5, 0, 60, 0),
            Event::note_on(1.0, 0, 62, 100),
            Event::note_off(1.5, 0, 62, 0),
            Event::control_change(2.0, 0, 7, 90),
            Event::note_on(3.0, 0, 64, 100),
            Event::note_off(3.5, 0, 64, 0),
        ],
    );
    {
        let mut lock = src.write_lock();
        src.set_natural_position(&mut lock, TimePos::Samples(96000));
        src.set_interpolation_of(&mut lock, Parameter::controller(0, 7), InterpolationStyle::Discrete);
    }
    src
}

#[test]
fn test_full_clone_rebuilds_target_model() {
    let src = clone_fixture();
    let target = source("copy");
    let old_model = MidiModel::new().into_shared();
    target.set_model(&mut target.write_lock(), old_model.clone());
    let rx = target.subscribe();

    src.write_to(&src.read_lock(), &target, 0.0, MAX_BEATS).unwrap();

    let lock = target.read_lock();
    let model = lock.model().unwrap();
    assert!(!Arc::ptr_eq(model, &old_model));
    assert_eq!(model.read().len(), 7);
    assert!(old_model.read().is_empty());
    assert_eq!(count_model_changed(&drain(&rx)), 1);

    assert_eq!(lock.natural_position(), TimePos::Samples(96000));
    assert_eq!(
        lock.interpolation_of(&Parameter::controller(0, 7)),
        InterpolationStyle::Discrete
    );
    assert!(lock.flags().writable);
    assert!(!lock.flags().removable);
    assert!(!lock.flags().removable_if_empty);
}

#[test]
fn test_partial_clone_reloads_in_place() {
    let src = clone_fixture();
    let target = source("section");
    let old_model = MidiModel::new().into_shared();
    target.set_model(&mut target.write_lock(), old_model.clone());
    let rx = target.subscribe();

    src.write_to(&src.read_lock(), &target, 1.0, 3.0).unwrap();

    let lock = target.read_lock();
    let model = lock.model().unwrap();
    assert!(Arc::ptr_eq(model, &old_model));
    assert_eq!(count_model_changed(&drain(&rx)), 1);

    let model = model.read();
    assert_eq!(model.len(), 3);
    assert!(model
        .events()
        .iter()
        .all(|e| (1.0..3.0).contains(&e.time())));
    assert!(!lock.flags().removable);
}

fn held_note_fixture() -> MidiSource {
    source_with_events(
        "held",
        vec![
            Event::note_on(0.0, 0, 64, 100),
            Event::note_off(0.75, 0, 64, 0),
            Event::note_on(1.0, 0, 60, 100),
            Event::note_off(5.0, 0, 60, 0),
        ],
    )
}

#[test]
fn test_partial_clone_closes_held_notes_at_end() {
    let src = held_note_fixture();
    let target = source("held copy");

    src.write_to(&src.read_lock(), &target, 0.5, 3.0).unwrap();

    let lock = target.read_lock();
    let model = lock.model().unwrap().read();
    let events = model.events();
    // the 0.75 note-off lost its note-on and is dropped
    assert_eq!(events.len(), 2);
    assert!(events[0].is_note_on());
    assert_eq!(events[0].time(), 1.0);

    let closing = &events[1];
    assert!(closing.is_note_off());
    assert_eq!(closing.time(), 3.0);
    assert_eq!(closing.channel(), 0);
    assert_eq!(closing.note(), Some(60));
    assert_eq!(closing.velocity(), Some(0));
}

#[test]
fn test_export_closes_held_notes_at_section_length() {
    let src = held_note_fixture();
    let target = source("held export");

    src.export_write_to(&src.read_lock(), &target, 0.5, 3.0)
        .unwrap();

    let lock = target.read_lock();
    let events = lock.storage().events();
    let times: Vec<f64> = events.iter().map(|e| e.time()).collect();
    assert_eq!(times, vec![0.5, 2.5]);
    assert!(events[1].is_note_off());
    assert_eq!(events[1].note(), Some(60));
}

#[test]
fn test_export_offsets_section_to_zero() {
    let src = clone_fixture();
    let target = source("export");

    src.export_write_to(&src.read_lock(), &target, 1.0, 3.0)
        .unwrap();

    let lock = target.read_lock();
    let times: Vec<f64> = lock.storage().events().iter().map(|e| e.time()).collect();
    assert_eq!(times, vec![0.0, 0.5, 1.0]);
    // export does not touch the target's model or flags
    assert!(lock.model().is_none());
    assert!(lock.flags().removable);
}

#[test]
fn test_session_saved_syncs_edited_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.mid");

    let src = MidiSource::with_storage(
        session(),
        "saved",
        SourceFlags::CAPTURE,
        Box::new(SmfStorage::create(&path, 960)),
    );
    let model = MidiModel::from_events([Event::note_on(0.0, 0, 60, 100)]).into_shared();
    src.set_model(&mut src.write_lock(), model.clone());

    // clean model: plain flush of (empty) storage
    src.session_saved().unwrap();
    assert!(path.exists());
    assert!(SmfStorage::open(&path).unwrap().is_empty());

    model
        .write()
        .insert_event(Event::note_off(1.0, 0, 60, 0));
    src.session_saved().unwrap();

    assert!(!model.read().edited());
    assert!(Arc::ptr_eq(src.read_lock().model().unwrap(), &model));
    let reopened = SmfStorage::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.events()[1].time(), 1.0);
}
