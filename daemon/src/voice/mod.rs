//! Voice output guard
//!
//! All speech goes through [`VoiceGuard::speak`], which holds a single lock
//! for the whole utterance so two replies can never overlap. The synthesis
//! engine is created lazily on first use and recreated once if it fails.

mod command;

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::error::Result;

pub use command::CommandEngineFactory;

/// Engine parameters applied at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// Voice names in order of preference
    pub preferred_voices: Vec<String>,
    /// Words per minute
    pub rate: u32,
    /// `0.0..=1.0`
    pub volume: f32,
}

impl From<&VoiceConfig> for VoiceSettings {
    fn from(cfg: &VoiceConfig) -> Self {
        Self {
            preferred_voices: cfg.preferred_voices.clone(),
            rate: cfg.rate,
            volume: cfg.volume,
        }
    }
}

/// A text-to-speech engine instance
pub trait SynthesisEngine: Send {
    /// Speak `text`, blocking until playback completes
    fn say(&mut self, text: &str) -> Result<()>;
}

/// Creates synthesis engines; called lazily and again after a failure
pub trait EngineFactory: Send + Sync {
    fn create(&self, settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>>;
}

/// First available voice whose name contains a preferred name
///
/// Preferences are tried in order, so the list order wins over the order
/// the engine reports its voices in.
pub fn select_voice<'a>(available: &'a [String], preferred: &[String]) -> Option<&'a str> {
    preferred.iter().find_map(|wanted| {
        let wanted = wanted.to_lowercase();
        available
            .iter()
            .find(|voice| voice.to_lowercase().contains(&wanted))
            .map(String::as_str)
    })
}

/// Serializes speech and owns the engine
pub struct VoiceGuard {
    factory: Box<dyn EngineFactory>,
    settings: VoiceSettings,
    engine: Mutex<Option<Box<dyn SynthesisEngine>>>,
    cooldown: Duration,
}

impl VoiceGuard {
    pub fn new(factory: Box<dyn EngineFactory>, settings: VoiceSettings, cooldown: Duration) -> Self {
        Self {
            factory,
            settings,
            engine: Mutex::new(None),
            cooldown,
        }
    }

    /// Speak `text` while holding the voice lock
    ///
    /// A synthesis error triggers one engine rebuild and retry; if the retry
    /// fails too, that error is returned. The lock is released on every path.
    pub fn speak(&self, text: &str) -> Result<()> {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);

        if slot.is_none() {
            debug!("initializing synthesis engine");
            *slot = Some(self.factory.create(&self.settings)?);
        }

        info!(text, "speaking");
        let first = slot.as_mut().map_or(Ok(()), |engine| engine.say(text));
        if let Err(err) = first {
            warn!(error = %err, "synthesis failed, reinitializing engine");
            *slot = None;
            let engine = slot.insert(self.factory.create(&self.settings)?);
            engine.say(text)?;
        }

        // keep the lock through the cooldown so utterances never run together
        thread::sleep(self.cooldown);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::error::Error;
    use crate::testing::{FailingEngineFactory, RecordingEngineFactory};

    fn settings() -> VoiceSettings {
        VoiceSettings::from(&VoiceConfig::default())
    }

    #[test]
    fn test_select_voice_by_preference_order() {
        let available = vec![
            "Microsoft David Desktop".to_string(),
            "Microsoft Hazel Desktop".to_string(),
            "Microsoft Zira Desktop".to_string(),
        ];
        let preferred = settings().preferred_voices;
        assert_eq!(
            select_voice(&available, &preferred),
            Some("Microsoft Zira Desktop")
        );
    }

    #[test]
    fn test_select_voice_case_insensitive_and_default() {
        let available = vec!["english-us".to_string(), "susan (en)".to_string()];
        let preferred = vec!["Susan".to_string()];
        assert_eq!(select_voice(&available, &preferred), Some("susan (en)"));

        let preferred = vec!["Zira".to_string()];
        assert_eq!(select_voice(&available, &preferred), None);
    }

    #[test]
    fn test_engine_created_lazily_once() {
        let factory = RecordingEngineFactory::default();
        let spoken = factory.spoken();
        let created = factory.created();
        let guard = VoiceGuard::new(Box::new(factory), settings(), Duration::ZERO);

        assert_eq!(created.load(Ordering::SeqCst), 0);
        guard.speak("one").unwrap();
        guard.speak("two").unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(*spoken.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_recovers_once_after_failure() {
        let factory = FailingEngineFactory::new(1);
        let attempts = factory.attempts();
        let guard = VoiceGuard::new(Box::new(factory), settings(), Duration::ZERO);

        assert!(guard.speak("hello").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_failure_propagates_and_releases_lock() {
        let factory = FailingEngineFactory::new(2);
        let guard = VoiceGuard::new(Box::new(factory), settings(), Duration::ZERO);

        assert!(matches!(guard.speak("hello"), Err(Error::Tts(_))));
        // lock was released: the next call proceeds and the engine has recovered
        assert!(guard.speak("again").is_ok());
    }

    struct SlowEngine {
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl SynthesisEngine for SlowEngine {
        fn say(&mut self, _text: &str) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowFactory {
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl EngineFactory for SlowFactory {
        fn create(&self, _settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>> {
            Ok(Box::new(SlowEngine {
                active: Arc::clone(&self.active),
                max_active: Arc::clone(&self.max_active),
            }))
        }
    }

    #[test]
    fn test_overlapping_calls_are_serialized() {
        let max_active = Arc::new(AtomicUsize::new(0));
        let factory = SlowFactory {
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::clone(&max_active),
        };
        let guard = Arc::new(VoiceGuard::new(Box::new(factory), settings(), Duration::ZERO));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || guard.speak(&format!("utterance {i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    /// Records when each utterance starts and finishes
    #[derive(Default)]
    struct TimedFactory {
        spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
    }

    struct TimedEngine {
        spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
    }

    impl SynthesisEngine for TimedEngine {
        fn say(&mut self, _text: &str) -> Result<()> {
            let start = Instant::now();
            thread::sleep(Duration::from_millis(10));
            self.spans.lock().unwrap().push((start, Instant::now()));
            Ok(())
        }
    }

    impl EngineFactory for TimedFactory {
        fn create(&self, _settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>> {
            Ok(Box::new(TimedEngine {
                spans: Arc::clone(&self.spans),
            }))
        }
    }

    #[test]
    fn test_next_utterance_waits_for_cooldown() {
        let cooldown = Duration::from_millis(100);
        let factory = TimedFactory::default();
        let spans = Arc::clone(&factory.spans);
        let guard = Arc::new(VoiceGuard::new(Box::new(factory), settings(), cooldown));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || guard.speak(&format!("utterance {i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let mut spans = spans.lock().unwrap().clone();
        spans.sort();
        assert_eq!(spans.len(), 2);
        let (_, first_end) = spans[0];
        let (second_start, _) = spans[1];
        assert!(second_start.duration_since(first_end) >= cooldown);
    }
}
