//! Console logging: colored, fastrace-span-aware, filtered by `LOG_LEVEL`.

use logforth::append;
use logforth::diagnostic::FastraceDiagnostic;
use logforth::filter::EnvFilter;

use crate::args::Args;

pub fn init(args: &Args) {
    let env_filter = EnvFilter::new(&args.log_level);

    logforth::builder()
        .dispatch(|d| {
            d.filter(env_filter)
                .diagnostic(FastraceDiagnostic::default())
                .append(append::Stderr::default())
        })
        .apply();
}
