#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    // Lowering either succeeds or reports; a lowered module always dumps.
    match shadex_parser::parse(source) {
        Ok(module) => {
            let _ = shadex_ir::dump_module(&module);
        }
        Err(err) => {
            let _ = err.emit_to_string(source);
        }
    }
});
