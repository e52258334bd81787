use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, PERSON_CLASS_ID};
use crate::frame::Frame;

/// One scripted inference outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptStep {
    /// A person at the given confidence.
    Person(f32),
    /// Nothing detected.
    Empty,
    /// Arbitrary detections.
    Detections(Vec<Detection>),
    /// Inference raises an error.
    Fail,
}

/// Backend that replays a fixed script, one step per `infer` call.
///
/// Once the script is exhausted every further call returns no detections.
pub struct ScriptedBackend {
    steps: VecDeque<ScriptStep>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            calls: 0,
        }
    }

    /// `true` becomes a confident person, `false` an empty frame.
    pub fn from_flags(flags: &[bool]) -> Self {
        Self::new(flags.iter().map(|&present| {
            if present {
                ScriptStep::Person(0.9)
            } else {
                ScriptStep::Empty
            }
        }))
    }

    /// Number of `infer` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        match self.steps.pop_front().unwrap_or(ScriptStep::Empty) {
            ScriptStep::Person(confidence) => Ok(vec![Detection {
                class_id: PERSON_CLASS_ID,
                confidence,
                bbox: BoundingBox::new(0.25, 0.1, 0.75, 0.95),
            }]),
            ScriptStep::Empty => Ok(Vec::new()),
            ScriptStep::Detections(detections) => Ok(detections),
            ScriptStep::Fail => Err(anyhow!("scripted inference failure at call {}", self.calls)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_backend_replays_steps_then_goes_quiet() {
        let frame = Frame::solid(2, 2, [0, 0, 0], 1).unwrap();
        let mut backend = ScriptedBackend::new([
            ScriptStep::Person(0.7),
            ScriptStep::Fail,
            ScriptStep::Empty,
        ]);

        let first = backend.infer(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].class_id, PERSON_CLASS_ID);
        assert!(backend.infer(&frame).is_err());
        assert!(backend.infer(&frame).unwrap().is_empty());
        assert!(backend.infer(&frame).unwrap().is_empty());
        assert_eq!(backend.calls(), 4);
        assert_eq!(backend.remaining(), 0);
    }
}
