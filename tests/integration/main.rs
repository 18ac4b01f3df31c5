//! Integration tests for upcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs::{self, File, FileTimes};
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    /// Command isolated from the user's config and environment
    fn upcache(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("upcache");
        cmd.env_remove("UPCACHE_ROOT")
            .env_remove("UPCACHE_KEEP")
            .env_remove("UPCACHE_CONFIG")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--root")
            .arg(temp.path().join("cache"));
        cmd
    }

    fn stage_json(temp: &TempDir, file: &Path) -> serde_json::Value {
        let output = upcache(temp)
            .arg("stage")
            .arg(file)
            .args(["--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("upcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("transient upload staging"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("upcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("upcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        upcache(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        upcache(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[reclaim]"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        upcache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());

        upcache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "[cache\nroot = 3").unwrap();
        upcache(&temp)
            .args(["sweep"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn stage_then_resolve() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("my photo.png");
        fs::write(&file, b"png").unwrap();

        let staged = stage_json(&temp, &file);
        let reference = staged["reference"].as_str().unwrap().to_string();
        assert!(reference.ends_with("/my_photo.png"));
        assert_eq!(staged["field"], "upload_upload_cache");

        upcache(&temp)
            .args(["resolve", &reference])
            .assert()
            .success()
            .stdout(predicate::str::contains(reference.as_str()));
    }

    #[test]
    fn resolve_traversal_reference_is_ignored() {
        let temp = TempDir::new().unwrap();
        upcache(&temp)
            .args(["resolve", "../../etc/passwd"])
            .assert()
            .success()
            .stderr(predicate::str::contains("No staged upload"));
    }

    #[test]
    fn clear_removes_staged_upload() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.txt");
        fs::write(&file, b"notes").unwrap();

        let staged = stage_json(&temp, &file);
        let path = staged["path"].as_str().unwrap().to_string();
        let reference = staged["reference"].as_str().unwrap().to_string();
        assert!(Path::new(&path).exists());

        upcache(&temp)
            .args(["clear", &reference])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared"));
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn sweep_dry_run_reports_nothing_fresh() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("fresh.txt");
        fs::write(&file, b"fresh").unwrap();
        stage_json(&temp, &file);

        upcache(&temp)
            .args(["sweep", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No uploads older than 24 hours"));
    }

    #[test]
    fn sweep_dry_run_keeps_candidates() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let empty = cache.join("abc-123");
        let old = cache.join("old-1");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("a.txt"), b"old").unwrap();
        let then = SystemTime::now() - std::time::Duration::from_secs(48 * 3600);
        File::options()
            .write(true)
            .open(old.join("a.txt"))
            .unwrap()
            .set_times(FileTimes::new().set_accessed(then).set_modified(then))
            .unwrap();

        upcache(&temp)
            .args(["sweep", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Would remove 2 upload(s)"));

        assert!(empty.exists());
        assert!(old.join("a.txt").exists());

        upcache(&temp).args(["sweep"]).assert().success();
        assert!(!empty.exists());
        assert!(!old.exists());
    }

    #[test]
    fn sweep_respects_keep_switch() {
        let temp = TempDir::new().unwrap();
        upcache(&temp)
            .env("UPCACHE_KEEP", "1")
            .args(["sweep"])
            .assert()
            .success()
            .stdout(predicate::str::contains("disabled"));
    }
}

mod lifecycle_tests {
    use std::fs::{self, File, FileTimes};
    use std::io::Read;
    use std::path::Path;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::SystemTime;
    use tempfile::TempDir;
    use upcache::cache::{CacheSettings, ResolveOptions, UploadCache};
    use upcache::params::{ParamBag, Upload};

    fn cache(temp: &TempDir) -> UploadCache {
        UploadCache::new(CacheSettings::new(temp.path().join("cache"))).unwrap()
    }

    fn age(path: &Path, hours: u64) {
        let then = SystemTime::now() - std::time::Duration::from_secs(hours * 3600);
        let file = File::options().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_accessed(then).set_modified(then))
            .unwrap();
    }

    #[test]
    fn upload_survives_a_round_trip() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let mut first = ParamBag::new();
        first.insert(
            "avatar",
            Upload::from_bytes("face").with_original_filename("C:\\Users\\me\\face.png"),
        );
        let staged = cache.scope().resolve(&mut first, &["avatar"]).unwrap();
        let field = staged.hidden_field().unwrap();
        assert_eq!(field.name, "avatar_upload_cache");
        assert!(field.value.ends_with("/face.png"));

        // next request: the browser drops the file but echoes the hidden field
        let mut second = ParamBag::new();
        second.insert(&field.name, field.value.as_str());
        let entry = cache.scope().resolve(&mut second, &["avatar"]).unwrap();

        assert_eq!(entry.value(), Some(field.value.as_str()));

        let mut body = String::new();
        second
            .get_mut(&["avatar"])
            .and_then(|p| p.as_upload_mut())
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "face");
        assert_eq!(entry.read_bytes().unwrap().as_deref(), Some(&b"face"[..]));
    }

    #[test]
    fn resolving_twice_in_one_request_is_stable() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut scope = cache.scope();
        let mut bag = ParamBag::new();
        bag.insert("upload", Upload::from_bytes("bytes"));

        let a = scope.resolve(&mut bag, &["upload"]).unwrap();
        let b = scope.resolve(&mut bag, &["upload"]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fs::read_dir(cache.root()).unwrap().count(), 1);
    }

    #[test]
    fn default_placeholder_without_upload() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut bag = ParamBag::new();
        let options = ResolveOptions::default().with_default_url("/images/blank.png");

        let entry = cache.scope().resolve_with(&mut bag, &["upload"], &options).unwrap();

        assert!(!entry.has_value());
        assert!(entry.hidden_field().is_none());
        assert_eq!(entry.url().as_deref(), Some("/images/blank.png"));
    }

    #[test]
    fn stale_upload_is_reclaimed_fresh_one_kept() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let mut old_bag = ParamBag::new();
        old_bag.insert("upload", Upload::from_bytes("old"));
        let old = cache.scope().resolve(&mut old_bag, &["upload"]).unwrap();
        let mut fresh_bag = ParamBag::new();
        fresh_bag.insert("upload", Upload::from_bytes("fresh"));
        let fresh = cache.scope().resolve(&mut fresh_bag, &["upload"]).unwrap();

        age(old.path().unwrap(), 25);
        let report = cache.sweep();

        assert_eq!(report.removed, vec![old.directory().unwrap().to_path_buf()]);
        assert!(!old.directory().unwrap().exists());
        assert!(fresh.path().unwrap().exists());
    }

    #[test]
    fn keep_switch_preserves_everything() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let mut bag = ParamBag::new();
        bag.insert("upload", Upload::from_bytes("keep me"));
        let entry = cache.scope().resolve(&mut bag, &["upload"]).unwrap();
        age(entry.path().unwrap(), 72);

        cache.reclaimer().switch().disable();
        let report = cache.sweep();
        entry.clear();

        assert!(report.disabled);
        assert!(report.removed.is_empty());
        assert!(entry.path().unwrap().exists());
        assert!(!entry.is_open());
    }

    #[test]
    fn foreign_directories_are_never_touched() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let foreign = cache.root().join("Not An Id!");
        fs::create_dir_all(&foreign).unwrap();
        fs::write(foreign.join("data"), b"x").unwrap();
        age(&foreign.join("data"), 100);

        let report = cache.sweep();

        assert!(report.removed.is_empty());
        assert!(foreign.join("data").exists());
    }

    #[test]
    fn concurrent_staging_survives_sweeps_and_clears() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let done = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let cache = cache.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || loop {
                cache.sweep();
                if done.load(Ordering::SeqCst) {
                    break;
                }
            })
        };

        let clearer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let mut bag = ParamBag::new();
                    bag.insert("upload", Upload::from_bytes(format!("scratch {}", i)));
                    let entry = cache.scope().resolve(&mut bag, &["upload"]).unwrap();
                    entry.clear();
                    assert!(!entry.directory().unwrap().exists());
                }
            })
        };

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            let body = format!("thread {} upload {}", t, i);
                            let mut bag = ParamBag::new();
                            bag.insert(
                                "upload",
                                Upload::from_bytes(body.clone()).with_original_filename("f.txt"),
                            );
                            let entry = cache.scope().resolve(&mut bag, &["upload"]).unwrap();
                            (entry, body)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let staged: Vec<_> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        clearer.join().unwrap();
        done.store(true, Ordering::SeqCst);
        sweeper.join().unwrap();

        let values: HashSet<_> = staged.iter().map(|(e, _)| e.value().unwrap()).collect();
        assert_eq!(values.len(), 100);
        for (entry, body) in &staged {
            assert_eq!(fs::read(entry.path().unwrap()).unwrap(), body.as_bytes());
            assert_eq!(entry.read_bytes().unwrap().as_deref(), Some(body.as_bytes()));
        }
    }
}
