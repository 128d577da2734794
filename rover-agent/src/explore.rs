//! Free-exploration policies for the EXPLORE mode.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rover_graph::{DeviceState, InputEvent, Utg};

/// How the controller picks an event when neither navigation nor
/// function testing prescribes one.
pub trait ExplorationStrategy: Send {
    fn pick(&mut self, state: &Arc<DeviceState>, utg: &Utg) -> Option<Arc<InputEvent>>;
}

/// Baseline policy: a uniformly random possible input, preferring events
/// the graph has never seen tried from this state.
pub struct RandomExplorer {
    rng: StdRng,
}

impl RandomExplorer {
    pub fn new() -> RandomExplorer {
        RandomExplorer {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> RandomExplorer {
        RandomExplorer {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomExplorer {
    fn default() -> Self {
        RandomExplorer::new()
    }
}

impl ExplorationStrategy for RandomExplorer {
    fn pick(&mut self, state: &Arc<DeviceState>, utg: &Utg) -> Option<Arc<InputEvent>> {
        let inputs = state.possible_inputs();
        if inputs.is_empty() {
            return None;
        }
        let unexplored: Vec<&Arc<InputEvent>> = inputs
            .iter()
            .filter(|event| !utg.is_event_explored(event, state))
            .collect();
        let pool = if unexplored.is_empty() {
            inputs.iter().collect()
        } else {
            unexplored
        };
        pool.choose(&mut self.rng).map(|event| (*event).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_api::{Bounds, ViewNode};

    fn two_button_state() -> Arc<DeviceState> {
        let views = vec![
            ViewNode {
                class: Some("android.widget.LinearLayout".into()),
                bounds: Bounds::new(0, 0, 1080, 1920),
                children: vec![1, 2],
                parent: -1,
                enabled: true,
                visible: true,
                ..Default::default()
            },
            ViewNode {
                class: Some("android.widget.Button".into()),
                resource_id: Some("com.example:id/first".into()),
                text: Some("First".into()),
                bounds: Bounds::new(0, 0, 100, 50),
                parent: 0,
                enabled: true,
                visible: true,
                clickable: true,
                ..Default::default()
            },
            ViewNode {
                class: Some("android.widget.Button".into()),
                resource_id: Some("com.example:id/second".into()),
                text: Some("Second".into()),
                bounds: Bounds::new(0, 60, 100, 110),
                parent: 0,
                enabled: true,
                visible: true,
                clickable: true,
                ..Default::default()
            },
        ];
        DeviceState::new(views, "com.example/.Main", vec![])
    }

    #[test]
    fn test_prefers_unexplored_events() {
        let state = two_button_state();
        let mut utg = Utg::new("com.example", None);
        utg.add_transition(None, None, &state);

        // explore the first event; the policy must now pick the other one
        let first = state.possible_inputs()[0].clone();
        let other = DeviceState::new(vec![], "com.example/.Other", vec![]);
        utg.add_transition(Some(&state), Some(&first), &other);

        let mut explorer = RandomExplorer::with_seed(7);
        for _ in 0..10 {
            let picked = explorer.pick(&state, &utg).unwrap();
            assert_ne!(picked.event_str(state.state_str()), first.event_str(state.state_str()));
        }
    }

    #[test]
    fn test_falls_back_to_explored_events() {
        let state = two_button_state();
        let mut utg = Utg::new("com.example", None);
        utg.add_transition(None, None, &state);
        for event in state.possible_inputs().to_vec() {
            let target = DeviceState::new(vec![], "com.example/.Other", vec![]);
            utg.add_transition(Some(&state), Some(&event), &target);
        }
        let mut explorer = RandomExplorer::with_seed(7);
        assert!(explorer.pick(&state, &utg).is_some());
    }

    #[test]
    fn test_empty_state_yields_none() {
        let state = DeviceState::new(vec![], "com.example/.Empty", vec![]);
        let utg = Utg::new("com.example", None);
        let mut explorer = RandomExplorer::with_seed(7);
        assert!(explorer.pick(&state, &utg).is_none());
    }
}
