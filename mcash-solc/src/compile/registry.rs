//! Process wide cache of loaded compilers, keyed by version

use crate::{
    compile::{CompilerModule, Solc},
    config::SolcConfig,
    error::{DownloadError, Result, SolcError},
    report, utils,
};
use once_cell::sync::OnceCell;
use semver::Version;
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc, Mutex, MutexGuard, Once, PoisonError,
    },
    thread,
    time::Duration,
};

/// How long to wait for a missing compiler to be fetched
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Directory below the home directory compilers are cached in
pub const CACHE_DIR: &str = ".mcashbox/solc";

static GLOBAL_REGISTRY: OnceCell<Arc<SolcRegistry>> = OnceCell::new();

/// Fetches the compiler of a specific version into the local cache
pub trait Downloader: Send + Sync {
    /// Writes the compiler for `version` to `dest`, the error is a human readable reason.
    ///
    /// `dest` is a staging file next to the cached binary, it is moved into place once this
    /// returns `Ok`.
    fn download(&self, version: &Version, dest: &Path) -> std::result::Result<(), String>;
}

type DownloadResult = std::result::Result<(), String>;

/// Install state of a single version
#[derive(Default)]
struct Install {
    /// A download that outlived the caller that started it
    pending: Option<Receiver<DownloadResult>>,
}

impl<F> Downloader for F
where
    F: Fn(&Version, &Path) -> std::result::Result<(), String> + Send + Sync,
{
    fn download(&self, version: &Version, dest: &Path) -> std::result::Result<(), String> {
        self(version, dest)
    }
}

/// Turns a cached compiler file into a callable module
pub type ModuleLoader = dyn Fn(&Path) -> Result<Arc<dyn CompilerModule>> + Send + Sync;

/// Maps versions to loaded compiler modules.
///
/// Every version is loaded at most once per registry, concurrent requests for the same version
/// wait for the first one to finish. Missing compilers are looked up in the cache directory
/// (`~/.mcashbox/solc/solc-v<version>` by default) and, if a [`Downloader`] is configured,
/// fetched there first. A download that timed out keeps running and later requests wait for it
/// instead of starting another one. Only completed downloads ever appear at the cached path.
pub struct SolcRegistry {
    cache_dir: PathBuf,
    modules: Mutex<HashMap<Version, Arc<dyn CompilerModule>>>,
    installs: Mutex<HashMap<Version, Arc<Mutex<Install>>>>,
    downloader: Option<Arc<dyn Downloader>>,
    loader: Box<ModuleLoader>,
    timeout: Duration,
    handlers: Once,
}

impl SolcRegistry {
    /// A registry that caches compilers in `cache_dir` and loads them as native [`Solc`]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            modules: Mutex::new(HashMap::new()),
            installs: Mutex::new(HashMap::new()),
            downloader: None,
            loader: Box::new(load_native),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            handlers: Once::new(),
        }
    }

    /// A registry using [`Self::default_cache_dir`]
    pub fn with_default_cache() -> Result<Self> {
        let dir = Self::default_cache_dir()
            .ok_or_else(|| SolcError::config("could not determine the home directory"))?;
        Ok(Self::new(dir))
    }

    /// `~/.mcashbox/solc`
    pub fn default_cache_dir() -> Option<PathBuf> {
        utils::home_dir().map(|home| home.join(CACHE_DIR))
    }

    #[must_use]
    pub fn with_downloader(mut self, downloader: impl Downloader + 'static) -> Self {
        self.downloader = Some(Arc::new(downloader));
        self
    }

    #[must_use]
    pub fn with_loader(
        mut self,
        loader: impl Fn(&Path) -> Result<Arc<dyn CompilerModule>> + Send + Sync + 'static,
    ) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Sets how long [`Self::get`] waits for a download
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the compiler for `version` is cached
    pub fn binary_path(&self, version: &Version) -> PathBuf {
        self.cache_dir.join(format!("solc-v{version}"))
    }

    /// Where the compiler for `version` is downloaded to before it is moved into the cache
    pub fn staging_path(&self, version: &Version) -> PathBuf {
        self.cache_dir.join(format!("solc-v{version}.download"))
    }

    /// Whether a module for `version` is already loaded
    pub fn is_loaded(&self, version: &Version) -> bool {
        lock(&self.modules).contains_key(version)
    }

    /// Registers an already loaded module, replacing any module of the same version
    pub fn insert(&self, version: Version, module: Arc<dyn CompilerModule>) {
        self.register(version, module);
    }

    /// Returns the module for the configured version
    pub fn resolve(&self, config: &SolcConfig) -> Result<Arc<dyn CompilerModule>> {
        let version = config.compiler_version()?;
        self.get(&version)
    }

    /// Returns the module for `version`, loading and if necessary downloading it first
    pub fn get(&self, version: &Version) -> Result<Arc<dyn CompilerModule>> {
        if let Some(module) = lock(&self.modules).get(version) {
            return Ok(Arc::clone(module))
        }

        let install = Arc::clone(lock(&self.installs).entry(version.clone()).or_default());
        let mut install = lock(&install);

        // another caller may have finished while we were waiting
        if let Some(module) = lock(&self.modules).get(version) {
            return Ok(Arc::clone(module))
        }

        let path = self.binary_path(version);
        if install.pending.is_some() || !path.exists() {
            let download = match install.pending.take() {
                Some(download) => {
                    tracing::trace!(target: "solc", %version, "waiting for running download");
                    download
                }
                None => {
                    let downloader = self.downloader.as_ref().ok_or_else(|| {
                        SolcError::config(format!(
                            "solc {version} is not installed at \"{}\" and no downloader is configured",
                            path.display()
                        ))
                    })?;
                    self.start_download(downloader, version, &path)?
                }
            };
            self.await_download(&mut install, download, version)?;
            if !path.exists() {
                return Err(DownloadError::Missing { version: version.clone(), path }.into())
            }
        }

        tracing::trace!(target: "solc", %version, path = %path.display(), "loading solc");
        let module = (self.loader)(&path)?;
        Ok(self.register(version.clone(), module))
    }

    fn register(&self, version: Version, module: Arc<dyn CompilerModule>) -> Arc<dyn CompilerModule> {
        self.handlers.call_once(|| module.uninstall_global_handlers());
        lock(&self.modules).insert(version, Arc::clone(&module));
        module
    }

    /// Runs the download on a worker thread. The worker moves the staged file to `path` only
    /// after the downloader succeeded and removes it otherwise.
    fn start_download(
        &self,
        downloader: &Arc<dyn Downloader>,
        version: &Version,
        path: &Path,
    ) -> Result<Receiver<DownloadResult>> {
        fs::create_dir_all(&self.cache_dir).map_err(|err| SolcError::io(err, &self.cache_dir))?;
        let staging = self.staging_path(version);
        // leftover of an interrupted process
        if staging.exists() {
            fs::remove_file(&staging).map_err(|err| SolcError::io(err, &staging))?;
        }
        report::solc_installation_start(version);
        tracing::trace!(target: "solc", %version, staging = %staging.display(), "downloading solc");

        let (tx, rx) = mpsc::channel();
        let task = Arc::clone(downloader);
        let task_version = version.clone();
        let dest = path.to_path_buf();
        thread::spawn(move || {
            let result = task.download(&task_version, &staging).and_then(|()| {
                if staging.exists() {
                    fs::rename(&staging, &dest).map_err(|err| err.to_string())
                } else {
                    Ok(())
                }
            });
            if result.is_err() {
                let _ = fs::remove_file(&staging);
            }
            // the receiver is gone if the registry was dropped
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    fn await_download(
        &self,
        install: &mut Install,
        download: Receiver<DownloadResult>,
        version: &Version,
    ) -> Result<()> {
        let err = match download.recv_timeout(self.timeout) {
            Ok(Ok(())) => {
                report::solc_installation_success(version);
                return Ok(())
            }
            Ok(Err(reason)) => DownloadError::Failed { version: version.clone(), reason },
            Err(RecvTimeoutError::Timeout) => {
                install.pending = Some(download);
                DownloadError::Timeout { version: version.clone(), timeout: self.timeout }
            }
            Err(RecvTimeoutError::Disconnected) => DownloadError::Failed {
                version: version.clone(),
                reason: "download task ended without a result".to_string(),
            },
        };
        report::solc_installation_error(version, &err.to_string());
        Err(err.into())
    }

    /// The process wide registry, created with the default cache directory on first use
    pub fn global() -> Result<Arc<SolcRegistry>> {
        GLOBAL_REGISTRY
            .get_or_try_init(|| Self::with_default_cache().map(Arc::new))
            .cloned()
    }

    /// Installs the process wide registry, returns it back if one is already set
    pub fn set_global(registry: SolcRegistry) -> std::result::Result<(), Arc<SolcRegistry>> {
        GLOBAL_REGISTRY.set(Arc::new(registry))
    }
}

impl fmt::Debug for SolcRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut versions: Vec<_> = lock(&self.modules).keys().cloned().collect();
        versions.sort();
        f.debug_struct("SolcRegistry")
            .field("cache_dir", &self.cache_dir)
            .field("loaded", &versions)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn load_native(path: &Path) -> Result<Arc<dyn CompilerModule>> {
    Ok(Arc::new(Solc::new(path)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{EntryPoint, ImportCallback};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingModule {
        uninstalled: Arc<AtomicUsize>,
    }

    impl CompilerModule for CountingModule {
        fn version(&self) -> Result<String> {
            Ok("0.5.4+commit.9549d8ff".to_string())
        }

        fn exposes(&self, entry: EntryPoint) -> bool {
            entry == EntryPoint::CompileStandard
        }

        fn call(&self, _: EntryPoint, _: &str, _: Option<&mut ImportCallback<'_>>) -> Result<String> {
            Ok("{}".to_string())
        }

        fn uninstall_global_handlers(&self) {
            self.uninstalled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_loader(
        uninstalled: Arc<AtomicUsize>,
    ) -> impl Fn(&Path) -> Result<Arc<dyn CompilerModule>> + Send + Sync {
        move |_: &Path| {
            Ok(Arc::new(CountingModule { uninstalled: Arc::clone(&uninstalled) })
                as Arc<dyn CompilerModule>)
        }
    }

    #[test]
    fn returns_inserted_module() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path());
        let version = Version::new(0, 5, 4);
        let module: Arc<dyn CompilerModule> = Arc::new(CountingModule::default());
        registry.insert(version.clone(), Arc::clone(&module));

        assert!(registry.is_loaded(&version));
        assert!(Arc::ptr_eq(&registry.get(&version).unwrap(), &module));
    }

    #[test]
    fn missing_compiler_without_downloader_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path());
        let err = registry.get(&Version::new(0, 4, 25)).unwrap_err();
        assert!(matches!(err, SolcError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn unsupported_version_is_rejected_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path());
        let config = SolcConfig::default().with_version("0.6.0");
        assert!(matches!(
            registry.resolve(&config).unwrap_err(),
            SolcError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn loads_cached_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let uninstalled = Arc::new(AtomicUsize::new(0));
        let registry =
            SolcRegistry::new(dir.path()).with_loader(counting_loader(Arc::clone(&uninstalled)));
        let version = Version::new(0, 5, 4);
        assert_eq!(registry.binary_path(&version), dir.path().join("solc-v0.5.4"));
        fs::write(registry.binary_path(&version), "").unwrap();

        let first = registry.resolve(&SolcConfig::default()).unwrap();
        let second = registry.get(&version).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(uninstalled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn uninstalls_handlers_only_for_first_module() {
        let dir = tempfile::tempdir().unwrap();
        let uninstalled = Arc::new(AtomicUsize::new(0));
        let registry =
            SolcRegistry::new(dir.path()).with_loader(counting_loader(Arc::clone(&uninstalled)));
        for version in [Version::new(0, 5, 4), Version::new(0, 4, 25)] {
            fs::write(registry.binary_path(&version), "").unwrap();
            registry.get(&version).unwrap();
        }
        assert_eq!(uninstalled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn downloads_missing_compiler_once() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&downloads);
        let registry = Arc::new(
            SolcRegistry::new(dir.path().join("solc"))
                .with_loader(counting_loader(Arc::new(AtomicUsize::new(0))))
                .with_downloader(move |_: &Version, dest: &Path| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    fs::write(dest, "").map_err(|err| err.to_string())
                }),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get(&Version::new(0, 5, 4)).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(downloads.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("solc").join("solc-v0.5.4").exists());
    }

    #[test]
    fn reports_failed_download() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path())
            .with_downloader(|_: &Version, _: &Path| -> std::result::Result<(), String> {
                Err("404 Not Found".to_string())
            });
        match registry.get(&Version::new(0, 5, 4)).unwrap_err() {
            SolcError::Download(DownloadError::Failed { reason, .. }) => {
                assert_eq!(reason, "404 Not Found")
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn download_without_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            SolcRegistry::new(dir.path())
            .with_downloader(|_: &Version, _: &Path| -> std::result::Result<(), String> { Ok(()) });
        assert!(matches!(
            registry.get(&Version::new(0, 5, 4)).unwrap_err(),
            SolcError::Download(DownloadError::Missing { .. })
        ));
    }

    #[test]
    fn timed_out_download_is_not_started_twice() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&downloads);
        let registry = SolcRegistry::new(dir.path())
            .with_timeout(Duration::from_millis(20))
            .with_loader(counting_loader(Arc::new(AtomicUsize::new(0))))
            .with_downloader(move |_: &Version, dest: &Path| -> std::result::Result<(), String> {
                counter.fetch_add(1, Ordering::SeqCst);
                fs::write(dest, "partial").map_err(|err| err.to_string())?;
                thread::sleep(Duration::from_millis(300));
                fs::write(dest, "complete").map_err(|err| err.to_string())
            });
        let version = Version::new(0, 5, 4);

        for _ in 0..2 {
            assert!(matches!(
                registry.get(&version).unwrap_err(),
                SolcError::Download(DownloadError::Timeout { .. })
            ));
            assert!(!registry.binary_path(&version).exists());
        }

        thread::sleep(Duration::from_millis(500));
        registry.get(&version).unwrap();
        assert_eq!(downloads.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read_to_string(registry.binary_path(&version)).unwrap(), "complete");
        assert!(!registry.staging_path(&version).exists());
    }

    #[test]
    fn failed_download_leaves_no_binary() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path()).with_downloader(
            |_: &Version, dest: &Path| -> std::result::Result<(), String> {
                fs::write(dest, "partial").map_err(|err| err.to_string())?;
                Err("connection reset".to_string())
            },
        );
        let version = Version::new(0, 5, 4);
        assert!(matches!(
            registry.get(&version).unwrap_err(),
            SolcError::Download(DownloadError::Failed { .. })
        ));
        assert!(!registry.binary_path(&version).exists());
        assert!(!registry.staging_path(&version).exists());
    }

    #[test]
    fn download_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SolcRegistry::new(dir.path())
            .with_timeout(Duration::from_millis(20))
            .with_downloader(|_: &Version, _: &Path| -> std::result::Result<(), String> {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            });
        let err = registry.get(&Version::new(0, 5, 4)).unwrap_err();
        assert!(matches!(err, SolcError::Download(DownloadError::Timeout { .. })));
        assert!(err.is_fatal());
    }
}
