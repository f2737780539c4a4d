// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The single active encoder of the current command buffer.

use strata_core::renderer::{ComputeEncoder, RenderEncoder};

/// Which kind of encoder is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// No encoder is open.
    Neither,
    /// A render encoder is open.
    Graphics,
    /// A compute encoder is open.
    Compute,
}

/// At most one encoder is open on a command buffer. This type makes the other
/// states unrepresentable.
#[derive(Default)]
pub enum ActiveEncoder {
    /// No encoder is open.
    #[default]
    None,
    /// A render encoder is open.
    Graphics(Box<dyn RenderEncoder>),
    /// A compute encoder is open.
    Compute(Box<dyn ComputeEncoder>),
}

impl std::fmt::Debug for ActiveEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActiveEncoder").field(&self.kind()).finish()
    }
}

impl ActiveEncoder {
    /// The kind of the open encoder.
    pub fn kind(&self) -> EncoderKind {
        match self {
            ActiveEncoder::None => EncoderKind::Neither,
            ActiveEncoder::Graphics(_) => EncoderKind::Graphics,
            ActiveEncoder::Compute(_) => EncoderKind::Compute,
        }
    }

    /// The open render encoder, if that is what is open.
    pub fn graphics(&mut self) -> Option<&mut dyn RenderEncoder> {
        match self {
            ActiveEncoder::Graphics(encoder) => Some(encoder.as_mut()),
            _ => None,
        }
    }

    /// The open compute encoder, if that is what is open.
    pub fn compute(&mut self) -> Option<&mut dyn ComputeEncoder> {
        match self {
            ActiveEncoder::Compute(encoder) => Some(encoder.as_mut()),
            _ => None,
        }
    }

    /// Pops `open_debug_groups` groups, then ends whatever encoder is open.
    /// Returns what was ended.
    pub fn end(&mut self, open_debug_groups: usize) -> EncoderKind {
        match std::mem::take(self) {
            ActiveEncoder::None => EncoderKind::Neither,
            ActiveEncoder::Graphics(mut encoder) => {
                for _ in 0..open_debug_groups {
                    encoder.pop_debug_group();
                }
                encoder.end_encoding();
                EncoderKind::Graphics
            }
            ActiveEncoder::Compute(mut encoder) => {
                for _ in 0..open_debug_groups {
                    encoder.pop_debug_group();
                }
                encoder.end_encoding();
                EncoderKind::Compute
            }
        }
    }

    /// Pushes a debug group on the open encoder.
    pub fn push_debug_group(&mut self, label: &str) {
        match self {
            ActiveEncoder::None => {}
            ActiveEncoder::Graphics(encoder) => encoder.push_debug_group(label),
            ActiveEncoder::Compute(encoder) => encoder.push_debug_group(label),
        }
    }

    /// Pops a debug group on the open encoder.
    pub fn pop_debug_group(&mut self) {
        match self {
            ActiveEncoder::None => {}
            ActiveEncoder::Graphics(encoder) => encoder.pop_debug_group(),
            ActiveEncoder::Compute(encoder) => encoder.pop_debug_group(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEncoder;

    #[test]
    fn test_end_closes_debug_groups_first() {
        let encoder = MockEncoder::new();
        let calls = encoder.calls.clone();
        let mut active = ActiveEncoder::Graphics(Box::new(encoder));
        active.push_debug_group("shadows");
        assert_eq!(active.end(1), EncoderKind::Graphics);
        assert_eq!(active.kind(), EncoderKind::Neither);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["push shadows".to_string(), "pop".to_string(), "end_encoding".to_string()]
        );
        assert_eq!(active.end(0), EncoderKind::Neither);
    }

    #[test]
    fn test_accessors_match_the_open_kind() {
        let mut active = ActiveEncoder::Compute(Box::new(MockEncoder::new()));
        assert!(active.graphics().is_none());
        assert!(active.compute().is_some());
    }
}
