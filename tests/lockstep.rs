//! Encoder and decoder walk through the same states, checked through their event streams.
use adalzw::{Decoder, Encoder, Event, Mode, Threshold, MAX_WIDTH, MIN_WIDTH};
use std::sync::{Arc, Mutex};

fn noise(len: usize, bits: u32, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 32) as u8 & ((1u16 << bits) - 1) as u8
        })
        .collect()
}

struct Run {
    encoded: Vec<Event>,
    decoded: Vec<Event>,
}

fn recorder() -> (Arc<Mutex<Vec<Event>>>, impl FnMut(&Event) + Send + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event: &Event| {
        sink.lock().unwrap().push(event.clone())
    })
}

fn run(data: &[u8], mode: Mode, threshold: Threshold) -> Run {
    let (encoded, observer) = recorder();
    let mut encoder = Encoder::with_threshold(mode, threshold).with_observer(observer);
    let mut compressed = vec![];
    encoder
        .into_stream(&mut compressed)
        .encode_all(data)
        .status
        .unwrap();
    drop(encoder);

    let (decoded, observer) = recorder();
    let mut decoder = Decoder::with_threshold(threshold).with_observer(observer);
    let mut expanded = vec![];
    decoder
        .into_stream(&mut expanded)
        .decode_all(&compressed[..])
        .status
        .unwrap();
    drop(decoder);
    assert!(expanded == data, "{:?} did not round trip", mode);

    Run {
        encoded: take(&encoded),
        decoded: take(&decoded),
    }
}

fn take(events: &Mutex<Vec<Event>>) -> Vec<Event> {
    std::mem::take(&mut *events.lock().unwrap())
}

fn steps(events: &[Event]) -> impl Iterator<Item = (u16, usize, u8, u8, u32)> + '_ {
    events.iter().filter_map(|event| match *event {
        Event::Step {
            code,
            len,
            width,
            next_width,
            next_code,
        } => Some((code, len, width, next_width, next_code)),
        _ => None,
    })
}

#[test]
fn events_are_identical() {
    let inputs = [
        b"".to_vec(),
        b"aaaa".to_vec(),
        b"ab".repeat(10_000),
        noise(200_000, 8, 1),
        noise(200_000, 4, 2),
    ];
    for data in &inputs {
        for &mode in &[Mode::Freeze, Mode::Reset, Mode::Monitor] {
            let run = run(data, mode, Threshold::default());
            assert!(run.encoded == run.decoded, "{:?}, {} bytes", mode, data.len());
            assert_eq!(steps(&run.encoded).map(|s| s.1).sum::<usize>(), data.len());
            match run.encoded.last() {
                Some(Event::End { .. }) => {}
                other => panic!("stream ends with {:?}", other),
            }
        }
    }
}

#[test]
fn codes_fit_their_width() {
    let data = noise(300_000, 8, 7);
    let run = run(&data, Mode::Reset, Threshold::default());
    // Only codes assigned before a codeword may appear in it, including after resets.
    let mut assigned = 257;
    for (code, _, width, next_width, next_code) in steps(&run.encoded) {
        assert!((MIN_WIDTH..=MAX_WIDTH).contains(&width));
        assert!(u32::from(code) < 1 << width);
        assert!(u32::from(code) < assigned, "{} not yet assigned", code);
        assert!(next_code <= 1 << next_width);
        assigned = next_code;
    }
}

#[test]
fn width_only_grows_within_an_epoch() {
    let data = noise(300_000, 8, 11);
    let run = run(&data, Mode::Reset, Threshold::default());

    let mut width = MIN_WIDTH;
    let mut grown = vec![];
    let mut resets = 0;
    for event in &run.encoded {
        match *event {
            Event::Grow { width: to } => {
                assert_eq!(to, width + 1);
                width = to;
                grown.push(to);
            }
            Event::Reset => {
                assert_eq!(width, MAX_WIDTH);
                width = MIN_WIDTH;
                resets += 1;
            }
            Event::Step { next_width, .. } => assert_eq!(next_width, width),
            Event::End { width: used } => assert_eq!(used, width),
            _ => {}
        }
    }

    assert!(resets > 0);
    assert_eq!(&grown[..7], &[10, 11, 12, 13, 14, 15, 16]);
}

#[test]
fn growth_happens_exactly_when_exhausted() {
    let data = noise(200_000, 8, 13);
    let run = run(&data, Mode::Freeze, Threshold::default());

    let mut next_code = 257;
    for event in &run.encoded {
        match *event {
            Event::Grow { width } => assert_eq!(next_code, 1 << (width - 1)),
            Event::Step { next_code: n, .. } => next_code = n,
            _ => {}
        }
    }
}

#[test]
fn reset_restarts_numbering() {
    let data = noise(300_000, 8, 17);
    let run = run(&data, Mode::Reset, Threshold::default());

    let mut after_reset = false;
    let mut seen = 0;
    for event in &run.encoded {
        match *event {
            Event::Reset => after_reset = true,
            Event::Step {
                next_width,
                next_code,
                ..
            } if after_reset => {
                assert_eq!(next_width, MIN_WIDTH);
                // The carried-over entry may already be made.
                assert!(next_code <= 258, "{}", next_code);
                after_reset = false;
                seen += 1;
            }
            _ => {}
        }
    }
    assert!(seen > 0);
}

#[test]
fn freeze_stays_at_ceiling() {
    let data = noise(300_000, 8, 19);
    let run = run(&data, Mode::Freeze, Threshold::default());

    let frozen = run
        .encoded
        .iter()
        .position(|event| *event == Event::Freeze)
        .expect("dictionary never filled");

    for event in &run.encoded[frozen..] {
        match *event {
            Event::Grow { .. } | Event::Reset => panic!("{:?} after freezing", event),
            Event::Step {
                width, next_code, ..
            } => {
                assert_eq!(width, MAX_WIDTH);
                assert_eq!(next_code, 1 << 16);
            }
            _ => {}
        }
    }
}

/// A stream whose first part compresses well and whose second part has nothing in common with it.
fn shifting_data() -> (Vec<u8>, usize) {
    let mut data = noise(400_000, 4, 23);
    let boundary = data.len();
    data.extend(noise(400_000, 7, 29).into_iter().map(|byte| byte | 0x80));
    (data, boundary)
}

/// Bytes covered by data codes before the first trigger.
fn trigger_position(events: &[Event]) -> Option<usize> {
    let mut consumed = 0;
    for event in events {
        match *event {
            Event::Step { len, .. } => consumed += len,
            Event::Trigger { .. } => return Some(consumed),
            _ => {}
        }
    }
    None
}

#[test]
fn monitor_resets_after_degradation() {
    let (data, boundary) = shifting_data();
    let run = run(&data, Mode::Monitor, Threshold::default());
    assert!(run.encoded == run.decoded);

    let arm = run
        .encoded
        .iter()
        .position(|event| matches!(event, Event::Arm { .. }))
        .expect("monitor never armed");
    let trigger = run
        .encoded
        .iter()
        .position(|event| matches!(event, Event::Trigger { .. }))
        .expect("monitor never triggered");
    assert!(arm < trigger);
    assert_eq!(run.encoded[trigger + 1], Event::Reset);

    for event in &run.encoded[arm..trigger] {
        match *event {
            Event::Hold { baseline, ratio } => assert!(baseline / ratio <= 1.1),
            Event::Reset | Event::Grow { .. } => panic!("{:?} while armed", event),
            _ => {}
        }
    }
    match run.encoded[trigger] {
        Event::Trigger { baseline, ratio } => assert!(baseline / ratio > 1.1),
        ref other => panic!("{:?}", other),
    }

    // The first part keeps the ratio up, degradation starts with the second.
    let position = trigger_position(&run.encoded).unwrap_or(0);
    assert!(position > boundary, "{} <= {}", position, boundary);
}

#[test]
fn higher_threshold_triggers_later() {
    let (data, _) = shifting_data();
    let default = run(&data, Mode::Monitor, Threshold::default());
    let lenient = run(&data, Mode::Monitor, Threshold::new(1.5));
    assert!(lenient.encoded == lenient.decoded);

    let early = trigger_position(&default.encoded).expect("default threshold never triggered");
    let late = trigger_position(&lenient.encoded).expect("lenient threshold never triggered");
    assert!(early < late);
}

#[test]
fn monitor_never_triggers_on_uniform_data() {
    // Uniform statistics never degrade the ratio enough.
    let data = noise(400_000, 4, 31);
    let run = run(&data, Mode::Monitor, Threshold::default());
    assert!(run.encoded.iter().any(|event| matches!(event, Event::Arm { .. })));
    assert_eq!(trigger_position(&run.encoded), None);
}

/// The input up to and including the data code that caused the first event matching `boundary`.
fn prefix_through(data: &[u8], mode: Mode, boundary: impl Fn(&Event) -> bool) -> Vec<u8> {
    let run = run(data, mode, Threshold::default());
    let mut consumed = 0;
    let mut hit = false;
    for event in &run.encoded {
        match *event {
            // Width and policy changes come before the step of their code.
            Event::Step { len, .. } => {
                consumed += len;
                if hit {
                    return data[..consumed].to_vec();
                }
            }
            ref event if boundary(event) => hit = true,
            _ => {}
        }
    }
    panic!("boundary never reached");
}

/// The events closing a stream: the state change, the step of the last data code and the end.
fn tail(run: &Run) -> &[Event] {
    assert!(run.encoded == run.decoded);
    &run.encoded[run.encoded.len() - 3..]
}

fn step_widths(event: &Event) -> (u8, u8) {
    match *event {
        Event::Step {
            width, next_width, ..
        } => (width, next_width),
        ref other => panic!("expected a step, got {:?}", other),
    }
}

#[test]
fn end_code_after_last_code_fills_width() {
    // 256 distinct bytes, no pair repeats: 256 literals, the last one exhausting 9 bits.
    let data: Vec<u8> = (0..=255).collect();
    let coded = run(&data, Mode::Freeze, Threshold::default());
    assert_eq!(steps(&coded.encoded).count(), 256);
    let last = tail(&coded);
    assert_eq!(last[0], Event::Grow { width: 10 });
    assert_eq!(step_widths(&last[1]), (9, 10));
    assert_eq!(last[2], Event::End { width: 10 });
    assert_eq!(adalzw::expand(&adalzw::compress(&data, Mode::Freeze)).unwrap(), data);

    // The same boundary hit by a code that is not a literal.
    let data = prefix_through(&noise(4_096, 8, 77), Mode::Reset, |event| {
        *event == Event::Grow { width: 10 }
    });
    for &mode in &[Mode::Freeze, Mode::Reset, Mode::Monitor] {
        let coded = run(&data, mode, Threshold::default());
        let last = tail(&coded);
        assert_eq!(last[0], Event::Grow { width: 10 });
        assert_eq!(last[2], Event::End { width: 10 });
        assert_eq!(adalzw::expand(&adalzw::compress(&data, mode)).unwrap(), data);
    }
}

#[test]
fn end_code_right_after_reset() {
    let data = prefix_through(&noise(300_000, 8, 41), Mode::Reset, |event| {
        *event == Event::Reset
    });
    let coded = run(&data, Mode::Reset, Threshold::default());
    let last = tail(&coded);
    assert_eq!(last[0], Event::Reset);
    assert_eq!(step_widths(&last[1]), (MAX_WIDTH, MIN_WIDTH));
    assert_eq!(last[2], Event::End { width: MIN_WIDTH });
    assert_eq!(
        adalzw::expand(&adalzw::compress(&data, Mode::Reset)).unwrap(),
        data
    );

    // Frozen, the same input ends at the full width.
    let coded = run(&data, Mode::Freeze, Threshold::default());
    let last = tail(&coded);
    assert_eq!(last[0], Event::Freeze);
    assert_eq!(last[2], Event::End { width: MAX_WIDTH });
}

#[test]
fn end_code_right_after_trigger() {
    let (data, _) = shifting_data();
    let data = prefix_through(&data, Mode::Monitor, |event| {
        matches!(event, Event::Trigger { .. })
    });
    let coded = run(&data, Mode::Monitor, Threshold::default());
    let last = tail(&coded);
    assert_eq!(last[0], Event::Reset);
    assert_eq!(step_widths(&last[1]), (MAX_WIDTH, MIN_WIDTH));
    assert_eq!(last[2], Event::End { width: MIN_WIDTH });
}
