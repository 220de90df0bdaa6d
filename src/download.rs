use crate::{
    fetch::{parse_url, Fetch, Headers},
    DownloadError, ScrapeError, UnitError,
};
use futures::future::join_all;
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

pub const DEFAULT_OUTPUT_DIR: &str = "./downloads";

#[async_trait::async_trait]
pub trait Persist {
    async fn exists(&self, path: &Path) -> bool;
    /// Creates `dir` and any missing parents.
    async fn create_dir(&self, dir: &Path) -> io::Result<()>;
    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsPersist;

#[async_trait::async_trait]
impl Persist for FsPersist {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir(&self, dir: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(dir).await
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, bytes).await
    }
}

/// Last `/`-delimited component of `url` with the query string cut off.
/// A trailing slash is ignored, so `http://h/dir/` names `dir`.
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let name = last.split('?').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUnit {
    pub url: String,
    pub output_path: PathBuf,
}

impl DownloadUnit {
    pub fn new(url: &str, output_dir: &Path) -> Result<Self, UnitError> {
        let name = file_name_from_url(url).ok_or_else(|| UnitError::NoFileName(url.to_string()))?;
        Ok(DownloadUnit {
            url: url.to_string(),
            output_path: output_dir.join(name),
        })
    }

    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Downloader<F, P = FsPersist> {
    fetcher: F,
    persist: P,
}

impl<F: Fetch + Sync> Downloader<F, FsPersist> {
    pub fn new(fetcher: F) -> Self {
        Downloader {
            fetcher,
            persist: FsPersist,
        }
    }
}

impl<F, P> Downloader<F, P>
where
    F: Fetch + Sync,
    P: Persist + Sync,
{
    pub fn with_persist(fetcher: F, persist: P) -> Self {
        Downloader { fetcher, persist }
    }

    /// Downloads every URL into `output_dir`, all at once.
    ///
    /// The directory is created before anything is fetched. Failures of single
    /// units are logged and counted; the only error returned is a failure to
    /// prepare the directory.
    pub async fn run<S: AsRef<str>>(
        &self,
        urls: &[S],
        output_dir: &Path,
    ) -> Result<DownloadSummary, DownloadError> {
        if !self.persist.exists(output_dir).await {
            debug!("Create output directory {}", output_dir.display());
            self.persist
                .create_dir(output_dir)
                .await
                .map_err(|source| DownloadError::CreateDir {
                    path: output_dir.to_path_buf(),
                    source,
                })?;
        }

        let outcomes = join_all(
            urls.iter()
                .map(|url| self.download_and_report(url.as_ref(), output_dir)),
        )
        .await;

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        Ok(DownloadSummary {
            succeeded,
            failed: outcomes.len() - succeeded,
        })
    }

    /// Reports the unit as soon as it finishes, independently of its siblings.
    async fn download_and_report(&self, url: &str, output_dir: &Path) -> bool {
        match self.download(url, output_dir).await {
            Ok(unit) => {
                info!("Downloaded: {}", unit.file_name());
                true
            }
            Err(e) => {
                error!("Failed to download {}: {}", url, e);
                false
            }
        }
    }

    async fn download(&self, url: &str, output_dir: &Path) -> Result<DownloadUnit, UnitError> {
        let unit = DownloadUnit::new(url, output_dir)?;
        let fetched = self.fetcher.fetch(&unit.url, &Headers::new()).await?;
        self.persist
            .write(&unit.output_path, &fetched.body)
            .await
            .map_err(|source| UnitError::Write {
                path: unit.output_path.clone(),
                source,
            })?;
        Ok(unit)
    }
}

/// URLs from piped input, one per line. Lines are not validated.
pub fn read_urls(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// A URL given directly on the command line must be absolute.
pub fn validate_url(url: &str) -> Result<(), ScrapeError> {
    parse_url(url)
        .map(|_| ())
        .map_err(|_| ScrapeError::Usage("Invalid URL provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fetch::Fetched, FetchError};
    use pretty_assertions::assert_eq;
    use std::{
        collections::HashMap,
        fs,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };
    use tracing_subscriber::fmt::MakeWriter;

    /// Serves fixed bodies; unknown URLs fail with 404. Each URL sleeps for
    /// its configured delay first so completion order can be shuffled.
    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, (Vec<u8>, u64)>,
        hanging: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serve(mut self, url: &str, body: &[u8], delay_ms: u64) -> Self {
            self.bodies.insert(url.to_string(), (body.to_vec(), delay_ms));
            self
        }

        /// The fetch of `url` never completes.
        fn hang(mut self, url: &str) -> Self {
            self.hanging.push(url.to_string());
            self
        }
    }

    #[async_trait::async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str, _headers: &Headers) -> Result<Fetched, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hanging.iter().any(|hanging| hanging == url) {
                futures::future::pending::<()>().await;
            }
            match self.bodies.get(url) {
                Some((body, delay)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    Ok(Fetched {
                        body: body.clone(),
                        content_type: "application/octet-stream".to_string(),
                    })
                }
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    /// Counts directory creations on top of the real filesystem.
    #[derive(Default)]
    struct CountingPersist {
        created: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Persist for CountingPersist {
        async fn exists(&self, path: &Path) -> bool {
            FsPersist.exists(path).await
        }

        async fn create_dir(&self, dir: &Path) -> io::Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            FsPersist.create_dir(dir).await
        }

        async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            FsPersist.write(path, bytes).await
        }
    }

    /// Log sink shared with a test subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("http://h/a.jpg?x=1"), Some("a.jpg"));
        assert_eq!(file_name_from_url("http://h/b.png"), Some("b.png"));
        assert_eq!(file_name_from_url("http://h/dir/"), Some("dir"));
        assert_eq!(file_name_from_url("http://bad"), Some("bad"));
        assert_eq!(file_name_from_url("http://h/?x=1"), None);
        assert_eq!(file_name_from_url(""), None);
    }

    #[test]
    fn test_download_unit() {
        let unit = DownloadUnit::new("http://h/img/c.jpg?size=2", Path::new("out")).unwrap();
        assert_eq!(unit.output_path, Path::new("out").join("c.jpg"));
        assert_eq!(unit.file_name(), "c.jpg");
        assert!(matches!(
            DownloadUnit::new("http://h/?x=1", Path::new("out")),
            Err(UnitError::NoFileName(_))
        ));

        // trailing slash is dropped before taking the last segment
        let unit = DownloadUnit::new("http://h/", Path::new("out")).unwrap();
        assert_eq!(unit.file_name(), "h");
    }

    #[test]
    fn test_read_urls() {
        let input = "http://h/a.jpg\r\n\n  http://h/b.png  \nnot-a-url\n";
        assert_eq!(
            read_urls(input),
            vec!["http://h/a.jpg", "http://h/b.png", "not-a-url"]
        );
        assert!(read_urls("\n \n").is_empty());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a.png").is_ok());
        assert!(matches!(
            validate_url("a.png"),
            Err(ScrapeError::Usage(msg)) if msg == "Invalid URL provided"
        ));
    }

    #[tokio::test]
    async fn test_downloads_into_new_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("out");

        // the first URL finishes last
        let fetcher = FakeFetcher::default()
            .serve("http://h/a.jpg?x=1", b"jpeg bytes", 40)
            .serve("http://h/b.png", b"png bytes", 0);
        let downloader = Downloader::new(fetcher);

        let summary = downloader
            .run(&["http://h/a.jpg?x=1", "http://h/b.png"], &out)
            .await
            .unwrap();

        assert_eq!(summary, DownloadSummary { succeeded: 2, failed: 0 });
        assert_eq!(file_names(&out), vec!["a.jpg", "b.png"]);
        assert_eq!(fs::read(out.join("a.jpg")).unwrap(), b"jpeg bytes");
        assert_eq!(fs::read(out.join("b.png")).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default().serve("http://good/c.jpg", b"c", 10);
        let downloader = Downloader::new(fetcher);

        let urls = vec!["http://bad".to_string(), "http://good/c.jpg".to_string()];
        let summary = downloader.run(urls.as_slice(), tmp.path()).await.unwrap();

        assert_eq!(summary, DownloadSummary { succeeded: 1, failed: 1 });
        assert_eq!(downloader.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(file_names(tmp.path()), vec!["c.jpg"]);
    }

    #[tokio::test]
    async fn test_units_run_concurrently() {
        let tmp = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..20).map(|i| format!("http://h/{}.bin", i)).collect();
        let fetcher = urls
            .iter()
            .fold(FakeFetcher::default(), |f, url| f.serve(url, b"x", 100));
        let downloader = Downloader::new(fetcher);

        let started = std::time::Instant::now();
        let summary = downloader.run(urls.as_slice(), tmp.path()).await.unwrap();

        assert_eq!(summary.succeeded, 20);
        // sequential execution would take at least two seconds
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_directory_setup_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let fetcher = FakeFetcher::default().serve("http://h/a.jpg", b"a", 0);
        let downloader = Downloader::with_persist(fetcher, CountingPersist::default());

        for _ in 0..2 {
            downloader.run(&["http://h/a.jpg"], &out).await.unwrap();
        }
        assert_eq!(downloader.persist.created.load(Ordering::SeqCst), 1);

        // created once per run, not once per unit
        let fresh = tmp.path().join("fresh");
        let fetcher = FakeFetcher::default()
            .serve("http://h/1", b"1", 0)
            .serve("http://h/2", b"2", 0)
            .serve("http://h/3", b"3", 0);
        let downloader = Downloader::with_persist(fetcher, CountingPersist::default());
        downloader
            .run(&["http://h/1", "http://h/2", "http://h/3"], &fresh)
            .await
            .unwrap();
        assert_eq!(downloader.persist.created.load(Ordering::SeqCst), 1);
        assert_eq!(file_names(&fresh), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        // a directory with the target name makes the write fail
        fs::create_dir(tmp.path().join("taken.jpg")).unwrap();
        let fetcher = FakeFetcher::default()
            .serve("http://h/taken.jpg", b"x", 0)
            .serve("http://h/free.jpg", b"y", 0);
        let downloader = Downloader::new(fetcher);

        let summary = downloader
            .run(&["http://h/taken.jpg", "http://h/free.jpg"], tmp.path())
            .await
            .unwrap();
        assert_eq!(summary, DownloadSummary { succeeded: 1, failed: 1 });
        assert_eq!(fs::read(tmp.path().join("free.jpg")).unwrap(), b"y");
    }

    #[tokio::test]
    async fn test_unusable_output_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"").unwrap();
        let fetcher = FakeFetcher::default().serve("http://h/a", b"a", 0);
        let downloader = Downloader::new(fetcher);

        let result = downloader.run(&["http://h/a"], &file.join("sub")).await;
        assert!(matches!(result, Err(DownloadError::CreateDir { .. })));
        assert_eq!(downloader.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_units_report_without_waiting_for_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::default()
            .hang("http://h/hang.jpg")
            .serve("http://good/c.jpg", b"c", 0);
        let downloader = Downloader::new(fetcher);

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let urls = ["http://h/hang.jpg", "http://bad", "http://good/c.jpg"];
        let finished =
            tokio::time::timeout(Duration::from_millis(300), downloader.run(&urls, tmp.path()))
                .await;

        assert!(finished.is_err(), "the hanging unit keeps the run open");
        assert_eq!(fs::read(tmp.path().join("c.jpg")).unwrap(), b"c");
        let logs = logs.contents();
        assert!(logs.contains("Downloaded: c.jpg"), "{}", logs);
        assert!(logs.contains("Failed to download http://bad"), "{}", logs);
    }
}
