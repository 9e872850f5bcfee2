use super::*;

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_speaker_args() {
    let speaker = CommandSpeaker::new(strings(&["espeak", "-s", "{rate}", "-a", "{amplitude}"]))
        .with_rate(150)
        .with_volume(0.8);
    assert_eq!(speaker.amplitude(), 160);
    assert_eq!(speaker.args(), strings(&["-s", "150", "-a", "160"]));

    let loud = CommandSpeaker::new(strings(&["espeak"])).with_volume(3.0);
    assert_eq!(loud.amplitude(), 200);
    assert!(loud.args().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_speaker_runs_command() {
    let speaker = CommandSpeaker::new(strings(&["cat"]));
    speaker.speak("hello world").await.unwrap();

    let failing = CommandSpeaker::new(strings(&["sh", "-c", "echo broken >&2; exit 3"]));
    match failing.speak("hello").await.unwrap_err() {
        VoiceError::Command { program, stderr, .. } => {
            assert_eq!(program, "sh");
            assert_eq!(stderr, "broken");
        }
        err => panic!("unexpected error: {err:?}"),
    }
}

#[tokio::test]
async fn test_speaker_missing_program() {
    let speaker = CommandSpeaker::new(strings(&["chatpress-no-such-tts-binary"]));
    assert!(matches!(
        speaker.speak("hi").await.unwrap_err(),
        VoiceError::Io(_)
    ));

    let empty = CommandSpeaker::new(vec![]);
    assert!(matches!(
        empty.speak("hi").await.unwrap_err(),
        VoiceError::Unavailable(_)
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_recognizer() {
    let dir = tempfile::TempDir::new().unwrap();
    let audio = dir.path().join("clip.txt");
    std::fs::write(&audio, "  what time is it\n").unwrap();

    let recognizer = CommandRecognizer::new(strings(&["cat", "{audio}"]));
    assert_eq!(recognizer.recognize(&audio).await.unwrap(), "what time is it");

    let silent = CommandRecognizer::new(strings(&["true"]));
    assert!(matches!(
        silent.recognize(&audio).await.unwrap_err(),
        VoiceError::NoSpeech
    ));

    let failing = CommandRecognizer::new(strings(&["false"]));
    assert!(matches!(
        failing.recognize(&audio).await.unwrap_err(),
        VoiceError::Command { .. }
    ));
}
