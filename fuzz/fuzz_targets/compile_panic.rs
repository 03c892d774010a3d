#![no_main]
use ferrotex_texmath::{Catalog, ErrorPolicy, Outcome, TexCompiler, TexOptions};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static CATALOG: Lazy<Catalog> =
    Lazy::new(|| Catalog::with_defaults().expect("default packages register"));

fuzz_target!(|data: &[u8]| {
    // Errors are fine; panics and runaway loops are not.
    let source = String::from_utf8_lossy(data);
    let options = TexOptions {
        format_error: ErrorPolicy::Raise,
        max_macros: 200,
        ..TexOptions::default()
    };
    let Ok(mut compiler) = TexCompiler::new(&CATALOG, options) else {
        return;
    };
    for _ in 0..4 {
        match compiler.compile(&source, data.first().is_some_and(|b| b & 1 == 1)) {
            Ok(Outcome::NeedsResource(package)) => {
                if compiler.add_package(package.as_str()).is_err() {
                    return;
                }
            }
            _ => return,
        }
    }
});
