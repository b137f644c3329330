#![no_main]

use libfuzzer_sys::fuzz_target;
use scorealign_core::{parse_corresp, reconcile, ScoreNoteAttribute};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let table = parse_corresp(text);
    let attrs = vec![
        ScoreNoteAttribute::new("n1", 0.0, 60),
        ScoreNoteAttribute::new("n2", 1000.0, 64),
    ];
    let observations = reconcile(&table.rows, &attrs, 5.0);
    for (i, obs) in observations.iter().enumerate() {
        assert_eq!(obs.obs_num, i + 1);
    }
});
