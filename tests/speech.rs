//! Speech queue integration tests
//!
//! Uses a recording speaker so no audio hardware or TTS provider is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cozmo_assistant::Result;
use cozmo_assistant::voice::{SpeechQueue, Speaker};

/// Records utterances and the peak number spoken at once
#[derive(Default)]
struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl RecordingSpeaker {
    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.spoken.lock().unwrap().push(text.to_string());

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_sentences_are_spoken_in_order_one_at_a_time() {
    let speaker = RecordingSpeaker::with_delay(Duration::from_millis(5));
    let queue = SpeechQueue::spawn(Arc::clone(&speaker) as Arc<dyn Speaker>);

    queue.speak("Systems nominal. Battery at **80%**! Shall I continue?");
    queue.speak("Standing by.");
    queue.wait_idle().await;

    assert_eq!(
        speaker.spoken(),
        [
            "Systems nominal.",
            "Battery at 80%!",
            "Shall I continue?",
            "Standing by.",
        ]
    );
    assert_eq!(speaker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_drops_pending_sentences() {
    let speaker = RecordingSpeaker::with_delay(Duration::from_millis(200));
    let queue = SpeechQueue::spawn(Arc::clone(&speaker) as Arc<dyn Speaker>);

    queue.speak("One. Two. Three. Four.");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(queue.is_speaking());

    queue.cancel();
    queue.wait_idle().await;

    // The interrupted utterance never finishes, and nothing after it starts
    assert!(speaker.spoken().is_empty());
    assert!(!queue.is_speaking());

    queue.speak("Back online.");
    queue.wait_idle().await;
    assert_eq!(speaker.spoken(), ["Back online."]);
}

#[tokio::test]
async fn test_blank_text_queues_nothing() {
    let speaker = RecordingSpeaker::with_delay(Duration::ZERO);
    let queue = SpeechQueue::spawn(Arc::clone(&speaker) as Arc<dyn Speaker>);

    queue.speak("  \n ");

    assert!(!queue.is_speaking());
    queue.wait_idle().await;
    assert!(speaker.spoken().is_empty());
}

#[tokio::test]
async fn test_every_waiter_wakes_when_queue_drains() {
    let speaker = RecordingSpeaker::with_delay(Duration::from_millis(50));
    let queue = SpeechQueue::spawn(Arc::clone(&speaker) as Arc<dyn Speaker>);

    // Idle queue returns at once
    tokio::time::timeout(Duration::from_millis(50), queue.wait_idle())
        .await
        .unwrap();

    queue.speak("First. Second.");
    let waiters = async { tokio::join!(queue.wait_idle(), queue.wait_idle()) };
    tokio::time::timeout(Duration::from_secs(2), waiters)
        .await
        .unwrap();

    assert!(!queue.is_speaking());
    assert_eq!(speaker.spoken(), ["First.", "Second."]);
}
