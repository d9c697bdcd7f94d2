#![no_main]

use libfuzzer_sys::fuzz_target;
use shadex_backend_glsl::Options;

const TARGETS: &[(u32, bool)] = &[(450, false), (330, false), (150, false), (310, true), (300, true)];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(source) = std::str::from_utf8(rest) else {
        return;
    };
    let Ok(module) = shadex_parser::parse(source) else {
        return;
    };
    let (version, es) = TARGETS[selector as usize % TARGETS.len()];
    for ep in &module.entry_points {
        let options = Options {
            version,
            es,
            entry_point: Some(ep.name.clone()),
            ..Options::default()
        };
        // Compilation converges or reports an error; it never panics or loops.
        let _ = shadex_backend_glsl::compile(&module, &options);
    }
});
