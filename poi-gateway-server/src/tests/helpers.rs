//! Test helpers wiring gateways to scripted mirrors.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use poi_gateway_core::{ResponseCache, SharedFifoCache};
use poi_gateway_upstream::test_support::{FixedJitter, RecordingSleeper, ScriptedTransport};
use poi_gateway_upstream::{Dispatcher, Gateway, Mirror, MirrorList, RetryEngine};

pub(super) const PRIMARY: &str = "http://primary.test/api/interpreter";

/// Gateway over a single scripted mirror that never waits between attempts.
pub(super) fn scripted_gateway(transport: &Arc<ScriptedTransport>) -> Gateway {
    scripted_gateway_with_cache(transport, Arc::new(SharedFifoCache::default()))
}

/// As [`scripted_gateway`], backed by `cache`.
pub(super) fn scripted_gateway_with_cache(
    transport: &Arc<ScriptedTransport>,
    cache: Arc<dyn ResponseCache>,
) -> Gateway {
    let engine = RetryEngine::new(transport.clone())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .with_jitter(Arc::new(FixedJitter::new(Duration::ZERO)));
    let mirrors = MirrorList::new(vec![primary()]).expect("non-empty list");
    Gateway::new(Dispatcher::new(mirrors, engine), cache)
}

pub(super) fn primary() -> Mirror {
    Mirror::parse(PRIMARY).expect("valid mirror")
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path, contents).expect("write fixture file");
}
