use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Whether the HLS muxer deletes segments as they roll out of the playlist window
/// (bounded disk use) or keeps every segment it has ever written (full archive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeepFiles {
    Delete,
    Keep,
}

fn hls_flags(keep: KeepFiles) -> &'static str {
    match keep {
        KeepFiles::Keep => "append_list",
        KeepFiles::Delete => "delete_segments+append_list",
    }
}

/// Builds the argument vector for the external transcoder. Pure and independent of
/// the child process itself so the exact command line is unit-testable without
/// spawning anything.
pub fn build_args(uri: &str, store_dir: &Path, audio_enabled: bool, keep: KeepFiles) -> Vec<String> {
    let playlist = store_dir.join("index.m3u8");
    let segment_filename = store_dir.join("%d.ts");

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-fflags".into(),
        "nobuffer".into(),
        "-rtsp_transport".into(),
        "tcp".into(),
        "-i".into(),
        uri.into(),
        "-vsync".into(),
        "0".into(),
        "-copyts".into(),
        "-vcodec".into(),
        "copy".into(),
    ];

    if !audio_enabled {
        args.push("-an".into());
    }

    args.extend([
        "-movflags".into(),
        "frag_keyframe+empty_moov".into(),
        "-hls_flags".into(),
        hls_flags(keep).into(),
        "-f".into(),
        "hls".into(),
        "-segment_list_flags".into(),
        "live".into(),
        "-hls_time".into(),
        "1".into(),
        "-hls_list_size".into(),
        "3".into(),
        "-hls_segment_filename".into(),
        segment_filename.to_string_lossy().into_owned(),
        playlist.to_string_lossy().into_owned(),
    ]);

    args
}

/// Spawns the transcoder against `store_dir`, which must already exist. stdout and
/// stderr are piped so the supervisor can attach a log sink when one is configured.
pub fn spawn(binary: &str, args: &[String]) -> std::io::Result<Child> {
    Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn builds_tcp_transport_and_copy_codec() {
        let args = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), true, KeepFiles::Delete);
        let joined = args.join(" ");
        assert!(joined.contains("-rtsp_transport tcp"));
        assert!(joined.contains("-vcodec copy"));
        assert!(joined.contains("rtsp://cam/1"));
    }

    #[test]
    fn omits_audio_flag_when_disabled() {
        let with_audio = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), true, KeepFiles::Delete);
        let without_audio = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), false, KeepFiles::Delete);
        assert!(!with_audio.contains(&"-an".to_string()));
        assert!(without_audio.contains(&"-an".to_string()));
    }

    #[test]
    fn keep_files_selects_append_only_hls_flags() {
        let keep = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), true, KeepFiles::Keep);
        let delete = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), true, KeepFiles::Delete);
        assert!(keep.contains(&"append_list".to_string()));
        assert!(delete.contains(&"delete_segments+append_list".to_string()));
    }

    #[test]
    fn names_playlist_and_segments_under_store_dir() {
        let args = build_args("rtsp://cam/1", &PathBuf::from("/tmp/s1"), true, KeepFiles::Delete);
        assert!(args.last().unwrap().ends_with("s1/index.m3u8") || args.last().unwrap().ends_with("s1\\index.m3u8"));
        assert!(args.iter().any(|a| a.ends_with("%d.ts") || a.ends_with("%d.ts\"")));
    }
}
