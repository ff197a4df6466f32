use loopscore::audio::{Note, NoteParams, PitchClass, SampleParams, SoundLibrary};
use loopscore::host::HostCall;
use loopscore::{RecordingHost, Score, ScoreBuilder, ScorePlayer, piano_pizza};

/// Pairs every played call with the beat the host had reached.
fn timed_calls(calls: &[HostCall]) -> Vec<(f64, HostCall)> {
    let mut beat = 0.0;
    let mut timed = Vec::new();
    for call in calls {
        match call {
            HostCall::Advance(beats) => beat += beats,
            HostCall::Play { .. } | HostCall::PlaySample { .. } => timed.push((beat, call.clone())),
            HostCall::SetTempo(_) | HostCall::SelectSynth(_) | HostCall::Stop => {}
        }
    }
    timed
}

fn sample_beats(calls: &[HostCall], sample: &str) -> Vec<f64> {
    timed_calls(calls)
        .into_iter()
        .filter_map(|(beat, call)| match call {
            HostCall::PlaySample { name, .. } if name == sample => Some(beat),
            _ => None,
        })
        .collect()
}

#[test]
fn exported_score_plays_like_the_built_in_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piano_pizza.ron");
    piano_pizza().save(&path).unwrap();
    let loaded = Score::load(&path).unwrap();
    assert_eq!(loaded, piano_pizza());

    let mut from_file = RecordingHost::new();
    ScorePlayer::new(&loaded)
        .unwrap()
        .play(&mut from_file, 24.0)
        .unwrap();

    let mut built_in = RecordingHost::new();
    ScorePlayer::new(&piano_pizza())
        .unwrap()
        .play(&mut built_in, 24.0)
        .unwrap();

    assert_eq!(from_file.calls(), built_in.calls());
}

#[test]
fn crow_calls_every_other_melody_cycle() {
    let mut host = RecordingHost::new();
    ScorePlayer::new(&piano_pizza())
        .unwrap()
        .play(&mut host, 72.0)
        .unwrap();
    // pizza_sfx lasts 16 beats and waits for the next 12-beat melody cycle
    assert_eq!(sample_beats(host.calls(), "misc_crow"), vec![8.0, 32.0, 56.0]);
}

#[test]
fn drums_restart_on_every_half_bar() {
    let score = ScoreBuilder::new("bar")
        .tempo(120.0)
        .live_loop("melody", |l| l.sleep(4.0))
        .live_loop("drum_beat", |l| {
            l.sync("melody")
                .sample("drum_bass_soft", SampleParams::new().amp(1.5))
                .sleep(1.0)
                .sample("drum_snare_soft", SampleParams::new())
                .sleep(1.0)
        })
        .build()
        .unwrap();

    let mut host = RecordingHost::new();
    let report = ScorePlayer::new(&score).unwrap().play(&mut host, 8.0).unwrap();

    assert_eq!(sample_beats(host.calls(), "drum_bass_soft"), vec![0.0, 2.0, 4.0, 6.0]);
    assert_eq!(report.cycles, vec![("melody".to_string(), 2), ("drum_beat".to_string(), 4)]);
}

#[test]
fn every_iteration_opens_with_the_same_note() {
    let mut host = RecordingHost::new();
    ScorePlayer::new(&piano_pizza())
        .unwrap()
        .play(&mut host, 36.0)
        .unwrap();

    let openings: Vec<HostCall> = timed_calls(host.calls())
        .into_iter()
        .filter(|(beat, call)| {
            beat % 12.0 == 0.0 && matches!(call, HostCall::Play { params, .. } if params.release == Some(1.0))
        })
        .map(|(_, call)| call)
        .collect();

    assert_eq!(openings.len(), 3);
    assert_eq!(
        openings[0],
        HostCall::Play {
            pitch: Note::at(PitchClass::C, 4).into(),
            params: NoteParams::new().release(1.0),
        }
    );
    assert!(openings.iter().all(|call| *call == openings[0]));
}

#[test]
fn a_loop_the_host_refuses_leaves_the_others_playing() {
    let library = SoundLibrary::default();
    let mut score = piano_pizza();
    score.loops[1].steps[0] = loopscore::score::Step::Sample {
        name: "kazoo".to_string(),
        params: SampleParams::new(),
    };

    let mut host = RecordingHost::with_library(library);
    let report = ScorePlayer::new(&score).unwrap().play(&mut host, 24.0).unwrap();

    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].loop_name, "drum_beat");
    assert!(sample_beats(host.calls(), "drum_snare_soft").is_empty());
    assert_eq!(sample_beats(host.calls(), "misc_crow"), vec![8.0]);
    assert!(report.events_dispatched > 100);
}
