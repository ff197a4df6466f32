use super::{Score, ScoreBuilder};
use crate::audio::PitchClass::{A, B, C, D, E, F, G};
use crate::audio::{ChordQuality, Note, NoteParams, SampleParams, chord};

/// The Valentine's piano, pizza, cheese, bread and coffee score.
pub fn piano_pizza() -> Score {
    let n = Note::at;

    ScoreBuilder::new("piano_pizza")
        .tempo(120.0)
        .use_synth("piano")
        .live_loop("melody", |l| {
            let times = [0.5, 0.5, 0.5, 0.5, 1.0, 1.0];
            let params = NoteParams::new().release(1.0);
            l.play_pattern_timed(
                [n(C, 4), n(E, 4), n(G, 4), n(B, 4), n(A, 4), n(F, 4)],
                &times,
                params,
            )
            .play_pattern_timed(
                [n(D, 4), n(F, 4), n(A, 4), n(C, 5), n(B, 4), n(G, 4)],
                &times,
                params,
            )
            .sleep(4.0)
        })
        .live_loop("drum_beat", |l| {
            l.sync("melody")
                .sample("drum_bass_soft", SampleParams::new().amp(1.5))
                .sleep(1.0)
                .sample("drum_cymbal_soft", SampleParams::new().amp(0.5))
                .sleep(0.5)
                .sample("drum_snare_soft", SampleParams::new().amp(1.0))
                .sleep(0.5)
        })
        .use_synth("fm")
        .live_loop("bass", |l| {
            let params = NoteParams::new().release(0.8).amp(1.2);
            l.sync("melody")
                .note(n(C, 2), 1.0, params)
                .note(n(G, 2), 1.0, params)
                .note(n(A, 2), 1.0, params)
                .note(n(F, 2), 1.0, params)
        })
        .live_loop("coffee_arp", |l| {
            let params = NoteParams::new().release(0.3).amp(0.8);
            l.sync("melody")
                .use_synth("pretty_bell")
                .play_pattern_timed(chord(n(C, 4), ChordQuality::Major), &[0.25], params)
                .play_pattern_timed(chord(n(F, 4), ChordQuality::Major), &[0.25], params)
                .play_pattern_timed(chord(n(G, 4), ChordQuality::Major), &[0.25], params)
                .play_pattern_timed(chord(n(A, 4), ChordQuality::Minor), &[0.25], params)
        })
        .live_loop("pizza_sfx", |l| {
            l.sync("melody")
                .sleep(8.0)
                .sample("misc_crow", SampleParams::new().rate(0.5).amp(0.6))
                .sleep(8.0)
        })
        .into_score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Step, validate};

    #[test]
    fn five_loops_at_120_bpm() {
        let score = piano_pizza();
        assert_eq!(score.bpm, 120.0);
        let names: Vec<&str> = score.loops.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["melody", "drum_beat", "bass", "coffee_arp", "pizza_sfx"]);
        assert!(validate(&score).is_ok());
    }

    #[test]
    fn every_loop_but_melody_syncs_to_melody() {
        let score = piano_pizza();
        assert_eq!(score.loops[0].sync, None);
        for l in &score.loops[1..] {
            assert_eq!(l.sync.as_deref(), Some("melody"), "{}", l.name);
        }
    }

    #[test]
    fn cycle_lengths() {
        let score = piano_pizza();
        let cycle = |name: &str| score.get_loop(name).unwrap().cycle_beats();
        assert_eq!(cycle("melody"), 12.0);
        assert_eq!(cycle("drum_beat"), 2.0);
        assert_eq!(cycle("bass"), 4.0);
        assert_eq!(cycle("coffee_arp"), 3.0);
        assert_eq!(cycle("pizza_sfx"), 16.0);
    }

    #[test]
    fn synths_follow_definition_order() {
        let score = piano_pizza();
        let synth = |name: &str| score.get_loop(name).unwrap().initial_synth().to_string();
        assert_eq!(synth("melody"), "piano");
        assert_eq!(synth("drum_beat"), "piano");
        assert_eq!(synth("bass"), "fm");
        assert_eq!(synth("coffee_arp"), "fm");
        assert_eq!(
            score.get_loop("coffee_arp").unwrap().steps[0],
            Step::UseSynth("pretty_bell".into())
        );
    }
}
