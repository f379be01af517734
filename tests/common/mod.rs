#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use cb_bdti::domain::models::{
    DataModelSpec, FileFormat, GroupingRules, IntegrationRecord,
};
use cb_bdti::error::{BdtiError, Result};
use cb_bdti::services::artifacts::{render_grouping_rules, ArtifactSink};
use cb_bdti::services::confirm::Confirm;
use cb_bdti::services::deploy::Deployer;
use cb_bdti::services::orchestrator::{Endpoints, Orchestrator};
use cb_bdti::services::store::{DesiredConfig, RecordFile, RecordStore};
use cb_bdti::services::subscription::SubscriptionApi;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

pub const SUBSCRIPTIONS_URL: &str = "http://10.0.0.1:1026/ngsi-ld/v1/subscriptions";
pub const NOTIFY_URL: &str = "http://10.0.0.2:5050/notify";

pub const CONFIG: &str = r#"
[fiware]
orion_host = "10.0.0.1"
cygnus_host = "10.0.0.2"
cygnus_ssh_key_path = ""
cygnus_ssh_username = ""

[hdfs]
host = "hdfs.local"
port = "50070"
username = "hdfs"
format_file = "json-row"

[Weather]
types = "WeatherObserved WeatherAlert"
fiware_service = "openiot"
fiware_servicepath = "/spain"
throttling = "5"
expires = ""
file_path = "weather"
file_name = "weather_data"

[Alert]
types = "Alert"
fiware_service = "openiot"
fiware_servicepath = ""
file_path = "alerts"
file_name = "alert_data"

[Parking]
types = "OnStreetParking OffStreetParking"
fiware_service = "city"
fiware_servicepath = "/madrid"
file_path = "/parking"
file_name = "parking_data"
"#;

/// What the fake broker saw, and how it should answer next.
#[derive(Default)]
pub struct BrokerLog {
    pub probes: usize,
    pub created: Vec<String>,
    pub removed: Vec<(String, String, String)>,
    pub next_ids: VecDeque<String>,
    pub fail_create: bool,
    pub fail_remove: bool,
    pub probe_fails: bool,
    pub remove_unreachable: bool,
    pub remove_attempts: usize,
    counter: usize,
}

pub struct FakeBroker(pub Rc<RefCell<BrokerLog>>);

impl SubscriptionApi for FakeBroker {
    fn probe(&self, url: &str) -> Result<()> {
        let mut log = self.0.borrow_mut();
        log.probes += 1;
        if log.probe_fails {
            return Err(BdtiError::BrokerUnreachable(url.to_string()));
        }
        Ok(())
    }

    fn create(&self, spec: &DataModelSpec, url: &str, notify_url: &str) -> Result<String> {
        assert_eq!(url, SUBSCRIPTIONS_URL);
        assert_eq!(notify_url, NOTIFY_URL);
        let mut log = self.0.borrow_mut();
        if log.fail_create {
            return Err(BdtiError::SubscriptionCreateFailed { code: 500 });
        }
        log.counter += 1;
        let n = log.counter;
        let id = log.next_ids.pop_front().unwrap_or_else(|| format!("sub-{n}"));
        log.created.push(spec.name.clone());
        Ok(id)
    }

    fn remove(&self, name: &str, url: &str, id: &str, _service: &str) -> Result<()> {
        let mut log = self.0.borrow_mut();
        log.remove_attempts += 1;
        if log.remove_unreachable {
            return Err(BdtiError::BrokerUnreachable(url.to_string()));
        }
        if log.fail_remove {
            return Err(BdtiError::SubscriptionDeleteFailed {
                name: name.to_string(),
                url: url.to_string(),
                reason: Some("Subscription ID not found: 404".to_string()),
            });
        }
        log.removed
            .push((name.to_string(), url.to_string(), id.to_string()));
        Ok(())
    }
}

/// Real record file that counts persists.
pub struct CountingRecords {
    inner: RecordFile,
    persists: Rc<Cell<usize>>,
}

impl RecordStore for CountingRecords {
    fn get_record(&self, name: &str) -> Option<IntegrationRecord> {
        self.inner.get_record(name)
    }
    fn list_records(&self) -> Vec<IntegrationRecord> {
        self.inner.list_records()
    }
    fn put_record(&mut self, name: &str, record: IntegrationRecord) {
        self.inner.put_record(name, record)
    }
    fn remove_record(&mut self, name: &str) -> Option<IntegrationRecord> {
        self.inner.remove_record(name)
    }
    fn persist(&mut self) -> Result<()> {
        self.persists.set(self.persists.get() + 1);
        self.inner.persist()
    }
}

pub struct FakeArtifacts(pub Rc<RefCell<Vec<GroupingRules>>>);

impl ArtifactSink for FakeArtifacts {
    fn regenerate(&mut self, records: &[IntegrationRecord]) -> Result<()> {
        self.0
            .borrow_mut()
            .push(render_grouping_rules(records, FileFormat::JsonRow));
        Ok(())
    }
}

pub struct FakeDeployer {
    pub deploys: Rc<Cell<usize>>,
    pub releases: Rc<Cell<usize>>,
    pub fail: bool,
}

impl Deployer for FakeDeployer {
    fn redeploy(&mut self) -> Result<()> {
        if self.fail {
            return Err(BdtiError::AgentImageNotFound("fiware/cygnus-ngsi".into()));
        }
        self.deploys.set(self.deploys.get() + 1);
        Ok(())
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }
}

/// Replays scripted answers and remembers the questions. Runs out as "no".
pub struct Answers {
    answers: VecDeque<bool>,
    asked: Rc<RefCell<Vec<String>>>,
}

impl Confirm for Answers {
    fn confirm(&mut self, question: &str) -> bool {
        self.asked.borrow_mut().push(question.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}

/// Orchestrator over real TOML stores in a temp dir, with fake broker and deployer.
pub struct Harness {
    _tmp: TempDir,
    pub config_path: PathBuf,
    pub records_path: PathBuf,
    pub broker: Rc<RefCell<BrokerLog>>,
    pub persists: Rc<Cell<usize>>,
    pub regenerations: Rc<RefCell<Vec<GroupingRules>>>,
    pub deploys: Rc<Cell<usize>>,
    pub releases: Rc<Cell<usize>>,
    pub questions: Rc<RefCell<Vec<String>>>,
    pub deploy_fails: bool,
    minutes: Rc<Cell<i64>>,
}

impl Harness {
    pub fn new(config: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("cb_bdti.toml");
        fs::write(&config_path, config).expect("write config");
        let records_path = tmp.path().join("state").join("integrated.toml");
        Self {
            config_path,
            records_path,
            _tmp: tmp,
            broker: Rc::default(),
            persists: Rc::default(),
            regenerations: Rc::default(),
            deploys: Rc::default(),
            releases: Rc::default(),
            questions: Rc::default(),
            deploy_fails: false,
            minutes: Rc::default(),
        }
    }

    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    /// Fresh stores read from disk, as a new invocation would see them.
    pub fn orchestrator(&self, answers: &[bool]) -> Orchestrator {
        let specs = DesiredConfig::load_or_empty(&self.config_path).expect("load config");
        let records = CountingRecords {
            inner: RecordFile::load(&self.records_path).expect("load records"),
            persists: self.persists.clone(),
        };
        let minutes = self.minutes.clone();
        Orchestrator::new(
            Box::new(specs),
            Box::new(records),
            Box::new(FakeBroker(self.broker.clone())),
            Box::new(Answers {
                answers: answers.iter().copied().collect(),
                asked: self.questions.clone(),
            }),
        )
        .with_endpoints(Endpoints {
            subscriptions_url: SUBSCRIPTIONS_URL.to_string(),
            notify_url: NOTIFY_URL.to_string(),
        })
        .with_redeploy(
            Box::new(FakeArtifacts(self.regenerations.clone())),
            Box::new(FakeDeployer {
                deploys: self.deploys.clone(),
                releases: self.releases.clone(),
                fail: self.deploy_fails,
            }),
        )
        .with_clock(Box::new(move || {
            minutes.set(minutes.get() + 1);
            Self::base_time() + Duration::minutes(minutes.get())
        }))
    }

    pub fn stored(&self) -> RecordFile {
        RecordFile::load(&self.records_path).expect("reload records")
    }

    pub fn record_bytes(&self) -> Vec<u8> {
        fs::read(&self.records_path).unwrap_or_default()
    }
}

/// Isolated environment for running the binary.
pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub config: PathBuf,
    pub state_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");
        Self {
            config: tmp.path().join("etc").join("cb_bdti.toml"),
            state_dir: tmp.path().join("state"),
            artifacts_dir: tmp.path().join("artifacts"),
            home,
            _tmp: tmp,
        }
    }

    pub fn write_config(&self, contents: &str) {
        fs::create_dir_all(self.config.parent().expect("config dir")).expect("create config dir");
        fs::write(&self.config, contents).expect("write config");
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("cb-bdti");
        cmd.env("HOME", &self.home)
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .arg("--state-dir")
            .arg(&self.state_dir)
            .arg("--artifacts-dir")
            .arg(&self.artifacts_dir);
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn run_json_failure(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}
