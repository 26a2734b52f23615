/// ELI5:
/// ┌──────────── Animation vs Animator ────────────────────┐
/// │  Animation : the clip  ("Run", 8 frames, 3 ticks each)│
/// │  Animator  : the playhead walking through that clip   │
/// └───────────────────────────────────────────────────────┘
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub prefix: String,
    pub frame_count: u8,
    pub ticks_per_frame: u8,
    pub looping: bool,
}

impl Animation {
    /// Looping clip, zero counts are bumped to 1
    pub fn new(prefix: &str, frame_count: u8, ticks_per_frame: u8) -> Self {
        Animation {
            prefix: prefix.to_string(),
            frame_count: frame_count.max(1),
            ticks_per_frame: ticks_per_frame.max(1),
            looping: true,
        }
    }

    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    /// Sheet keys are 1 based : frame 0 -> "Run (1).png"
    pub fn frame_key(&self, frame: u8) -> String {
        format!("{} ({}).png", self.prefix, frame as u16 + 1)
    }

    pub fn total_ticks(&self) -> u16 {
        self.frame_count as u16 * self.ticks_per_frame as u16
    }
}

#[derive(Debug, Clone)]
pub struct Animator {
    animation: Animation,
    tick: u16,
}

impl Animator {
    pub fn new(animation: Animation) -> Self {
        Animator { animation, tick: 0 }
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    /// Swap clips, the playhead restarts at frame 0
    pub fn play(&mut self, animation: Animation) {
        if self.animation != animation {
            self.animation = animation;
            self.restart();
        }
    }

    pub fn restart(&mut self) {
        self.tick = 0;
    }

    /// One game tick; non looping clips hold their last frame
    pub fn update(&mut self) {
        let total = self.animation.total_ticks();
        if self.animation.looping {
            self.tick = (self.tick + 1) % total;
        } else if self.tick < total {
            self.tick += 1;
        }
    }

    pub fn current_frame(&self) -> u8 {
        let frame = self.tick / self.animation.ticks_per_frame as u16;
        frame.min(self.animation.frame_count as u16 - 1) as u8
    }

    pub fn current_frame_key(&self) -> String {
        self.animation.frame_key(self.current_frame())
    }

    pub fn is_finished(&self) -> bool {
        !self.animation.looping && self.tick >= self.animation.total_ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looping_clip_wraps() {
        let mut animator = Animator::new(Animation::new("Run", 2, 2));
        let frames: Vec<u8> = (0..5)
            .map(|_| {
                let frame = animator.current_frame();
                animator.update();
                frame
            })
            .collect();
        assert_eq!(frames, vec![0, 0, 1, 1, 0]);
        assert!(!animator.is_finished());
    }

    #[test]
    fn one_shot_clip_holds_last_frame() {
        let mut animator = Animator::new(Animation::new("Break", 3, 1).once());
        for _ in 0..10 {
            animator.update();
        }
        assert!(animator.is_finished());
        assert_eq!(animator.current_frame_key(), "Break (3).png");
    }

    #[test]
    fn play_restarts_only_on_a_new_clip() {
        let mut animator = Animator::new(Animation::new("Idle", 4, 1));
        animator.update();
        animator.play(Animation::new("Idle", 4, 1));
        assert_eq!(animator.current_frame(), 1);
        animator.play(Animation::new("Run", 4, 1));
        assert_eq!(animator.current_frame(), 0);
        assert_eq!(animator.animation().prefix, "Run");
    }
}
