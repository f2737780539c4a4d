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

//! Shadowed rasterizer state.

use strata_core::renderer::{RasterizerState, RenderEncoder, Winding};

/// Tracks the rasterizer state requested by the caller and the state last
/// applied to the current encoder, so only differences are re-issued.
#[derive(Debug, Default)]
pub struct RasterizerShadow {
    requested: RasterizerState,
    applied: Option<RasterizerState>,
}

impl RasterizerShadow {
    /// Records the state to apply before the next draw.
    pub fn set(&mut self, state: RasterizerState) {
        self.requested = state;
    }

    /// The requested state.
    pub fn requested(&self) -> &RasterizerState {
        &self.requested
    }

    /// Forgets what the encoder holds. Called whenever a new encoder opens.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    /// Brings `encoder` in line with the requested state. On a fresh encoder
    /// every field is set, along with counter-clockwise front faces. Returns
    /// the number of encoder calls issued.
    pub fn apply(&mut self, encoder: &mut dyn RenderEncoder) -> u32 {
        let state = self.requested;
        let mut calls = 0;
        let previous = self.applied.replace(state);
        if previous.is_none() {
            encoder.set_front_facing_winding(Winding::CounterClockwise);
            calls += 1;
        }

        if previous.map_or(true, |p| p.cull_mode != state.cull_mode) {
            encoder.set_cull_mode(state.cull_mode);
            calls += 1;
        }
        if previous.map_or(true, |p| {
            p.depth_bias != state.depth_bias || p.slope_scale_depth_bias != state.slope_scale_depth_bias
        }) {
            encoder.set_depth_bias(state.depth_bias, state.slope_scale_depth_bias, f32::MAX);
            calls += 1;
        }
        if previous.map_or(true, |p| p.fill_mode != state.fill_mode) {
            encoder.set_triangle_fill_mode(state.fill_mode);
            calls += 1;
        }
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEncoder;
    use strata_core::renderer::{CullMode, FillMode};

    #[test]
    fn test_fresh_encoder_gets_everything() {
        let mut shadow = RasterizerShadow::default();
        let mut encoder = MockEncoder::new();
        assert_eq!(shadow.apply(&mut encoder), 4);
        assert_eq!(encoder.take_calls()[0], "winding CounterClockwise");

        assert_eq!(shadow.apply(&mut encoder), 0);
    }

    #[test]
    fn test_only_differences_are_reissued() {
        let mut shadow = RasterizerShadow::default();
        let mut encoder = MockEncoder::new();
        shadow.apply(&mut encoder);
        encoder.take_calls();

        shadow.set(RasterizerState {
            cull_mode: CullMode::Back,
            ..*shadow.requested()
        });
        assert_eq!(shadow.apply(&mut encoder), 1);
        assert_eq!(encoder.take_calls(), vec!["cull Back".to_string()]);

        shadow.set(RasterizerState {
            fill_mode: FillMode::Wireframe,
            depth_bias: 2.0,
            ..*shadow.requested()
        });
        assert_eq!(shadow.apply(&mut encoder), 2);

        shadow.invalidate();
        assert_eq!(shadow.apply(&mut encoder), 4);
    }
}
