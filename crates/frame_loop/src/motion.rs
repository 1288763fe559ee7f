//! Motion policies - where the vehicle goes next
//!
//! The loop asks the policy once per tick, before the frame is requested.

use contracts::{FrameId, MotionConfig, VehicleState};

/// Supplies the vehicle state for each frame
pub trait MotionPolicy: Send {
    /// State to render `frame_id` with, given the state of the previous frame
    fn next_state(&mut self, frame_id: FrameId, current: &VehicleState) -> VehicleState;
}

impl<F> MotionPolicy for F
where
    F: FnMut(FrameId, &VehicleState) -> VehicleState + Send,
{
    fn next_state(&mut self, frame_id: FrameId, current: &VehicleState) -> VehicleState {
        self(frame_id, current)
    }
}

/// Keep the current state
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldState;

impl MotionPolicy for HoldState {
    fn next_state(&mut self, _frame_id: FrameId, current: &VehicleState) -> VehicleState {
        *current
    }
}

/// z 轴在 [min_z, max_z] 之间以固定步长往返，其余状态不变
#[derive(Debug, Clone)]
pub struct VerticalOscillation {
    min_z: f64,
    max_z: f64,
    step: f64,
    rising: bool,
}

impl VerticalOscillation {
    /// Bounds are swapped if given in reverse; the step is taken as a magnitude.
    pub fn new(min_z: f64, max_z: f64, step: f64) -> Self {
        Self {
            min_z: min_z.min(max_z),
            max_z: min_z.max(max_z),
            step: step.abs(),
            rising: true,
        }
    }

    pub fn is_rising(&self) -> bool {
        self.rising
    }
}

impl Default for VerticalOscillation {
    fn default() -> Self {
        Self::new(0.0, 5.0, 0.1)
    }
}

impl MotionPolicy for VerticalOscillation {
    fn next_state(&mut self, _frame_id: FrameId, current: &VehicleState) -> VehicleState {
        let mut next = *current;
        let z = if self.rising {
            current.pose.position.z + self.step
        } else {
            current.pose.position.z - self.step
        };

        if z >= self.max_z {
            self.rising = false;
        } else if z <= self.min_z {
            self.rising = true;
        }
        next.pose.position.z = z.clamp(self.min_z, self.max_z);
        next
    }
}

/// Scripted states indexed by frame id; holds the last one past the end
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    states: Vec<VehicleState>,
}

impl Trajectory {
    pub fn new(states: Vec<VehicleState>) -> Self {
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl FromIterator<VehicleState> for Trajectory {
    fn from_iter<I: IntoIterator<Item = VehicleState>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl MotionPolicy for Trajectory {
    fn next_state(&mut self, frame_id: FrameId, current: &VehicleState) -> VehicleState {
        let index = usize::try_from(frame_id).unwrap_or(usize::MAX);
        self.states
            .get(index)
            .or_else(|| self.states.last())
            .copied()
            .unwrap_or(*current)
    }
}

/// Build the policy named in configuration
pub fn motion_from_config(config: &MotionConfig) -> Box<dyn MotionPolicy> {
    match config {
        MotionConfig::Hold => Box::new(HoldState),
        MotionConfig::VerticalOscillation { min_z, max_z, step } => {
            Box::new(VerticalOscillation::new(*min_z, *max_z, *step))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z_sequence(policy: &mut dyn MotionPolicy, frames: u64) -> Vec<f64> {
        let mut state = VehicleState::zero();
        (0..frames)
            .map(|frame_id| {
                state = policy.next_state(frame_id, &state);
                state.pose.position.z
            })
            .collect()
    }

    #[test]
    fn test_hold_keeps_state() {
        let start = VehicleState::at_position(1.0, 2.0, 3.0);
        assert_eq!(HoldState.next_state(0, &start), start);
    }

    #[test]
    fn test_vertical_oscillation_bounces_between_bounds() {
        let mut policy = VerticalOscillation::new(0.0, 1.0, 0.25);
        let zs = z_sequence(&mut policy, 10);
        assert_eq!(zs, vec![0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25, 0.0, 0.25, 0.5]);
    }

    #[test]
    fn test_vertical_oscillation_stays_in_bounds() {
        let mut policy = VerticalOscillation::default();
        let zs = z_sequence(&mut policy, 200);
        assert!(zs.iter().all(|z| (0.0..=5.0).contains(z)));
        assert!(zs.iter().any(|z| (*z - 5.0).abs() < 1e-9));
    }

    #[test]
    fn test_trajectory_holds_last_state() {
        let mut trajectory: Trajectory = (0..3)
            .map(|i| VehicleState::at_position(i as f64, 0.0, 0.0))
            .collect();
        let start = VehicleState::zero();
        assert_eq!(trajectory.next_state(1, &start).pose.position.x, 1.0);
        assert_eq!(trajectory.next_state(10, &start).pose.position.x, 2.0);
        assert_eq!(Trajectory::default().next_state(0, &start), start);
    }

    #[test]
    fn test_closure_is_a_policy() {
        let mut policy = |frame_id: FrameId, _: &VehicleState| {
            VehicleState::at_position(0.0, 0.0, frame_id as f64)
        };
        let zs = z_sequence(&mut policy, 3);
        assert_eq!(zs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_motion_from_config() {
        let mut policy = motion_from_config(&MotionConfig::VerticalOscillation {
            min_z: 0.0,
            max_z: 5.0,
            step: 0.5,
        });
        assert_eq!(z_sequence(policy.as_mut(), 2), vec![0.5, 1.0]);
    }
}
