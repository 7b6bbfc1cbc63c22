//! In-process loopback stage used when ingress and egress share the same
//! physical audio path. Grounded directly on
//! `connections/local_audio_streamer.py`'s `process(chunk): yield chunk`.

use crate::model::Frame;
use crate::stage::Stage;

pub struct LocalLoopback;

impl Stage for LocalLoopback {
    type Input = Frame;
    type Output = Frame;

    fn name(&self) -> &str {
        "local-loopback"
    }

    fn process(&mut self, item: Frame) -> Vec<Frame> {
        vec![item]
    }
}
