use std::thread;
use std::time::Duration;

const FRAMES: [char; 4] = ['◰', '◳', '◲', '◱'];

/// Rotating progress glyph. Index-only state; stateless across ticks
/// otherwise.
#[derive(Default)]
pub struct Spinner {
    i: usize,
}

impl Spinner {
    pub fn new() -> Spinner {
        Spinner::default()
    }

    pub fn spin(&mut self) -> char {
        let glyph = FRAMES[self.i % FRAMES.len()];
        self.i += 1;
        glyph
    }
}

/// Poll `condition` at a fixed interval until it yields a value, feeding a
/// fresh spinner glyph to `feedback` after every unsuccessful poll.
///
/// The condition is checked before the first sleep, so a condition that is
/// already true returns without waiting. Failure policy is the caller's:
/// stages that tolerate transient errors swallow them inside `condition`,
/// fatal stages return an `Err` value through `T`.
pub fn wait_until<T>(
    interval: Duration,
    mut condition: impl FnMut() -> Option<T>,
    mut feedback: impl FnMut(char),
) -> T {
    let mut spinner = Spinner::new();
    loop {
        if let Some(value) = condition() {
            return value;
        }
        feedback(spinner.spin());
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;

    #[test]
    fn spinner_cycles_through_all_frames() {
        let mut spinner = Spinner::new();
        let first: Vec<char> = (0..4).map(|_| spinner.spin()).collect();
        assert_eq!(first, FRAMES);
        // Wraps around.
        assert_eq!(spinner.spin(), FRAMES[0]);
    }

    #[test]
    fn returns_immediately_when_condition_already_holds() {
        let mut feedback_calls = 0;
        let got = wait_until(Duration::from_millis(50), || Some(7), |_| feedback_calls += 1);
        assert_eq!(got, 7);
        assert_eq!(feedback_calls, 0);
    }

    #[test]
    fn polls_until_condition_flips() {
        let mut polls = 0;
        let mut feedback_calls = 0;
        let got = wait_until(
            Duration::from_millis(1),
            || {
                polls += 1;
                (polls >= 3).then_some("done")
            },
            |_| feedback_calls += 1,
        );
        assert_eq!(got, "done");
        assert_eq!(polls, 3);
        assert_eq!(feedback_calls, 2);
    }

    #[test]
    fn observes_file_created_mid_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("public.txt");

        let writer = {
            let path = path.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                std::fs::write(&path, "xfp: 0F056943\n").unwrap();
            })
        };

        let start = Instant::now();
        let found: PathBuf =
            wait_until(Duration::from_millis(50), || path.exists().then(|| path.clone()), |_| {});
        writer.join().unwrap();

        // Seen on the first poll at or after creation, within one interval.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(800));
        assert!(found.exists());
    }
}
