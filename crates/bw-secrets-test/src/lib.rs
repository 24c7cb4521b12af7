#![doc = include_str!("../README.md")]

use std::{
    collections::HashMap,
    io::{self, Cursor, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use bw_secrets_core::{
    process::{CommandRunner, Invocation, ProcessOutput},
    vault::{SecretField, SessionToken, VaultClient, VaultError, VaultOperation},
};

/// Config file contents with every required field set.
pub const VALID_CONFIG: &str = "\
BW_SERVER=https://vault.example.com
BW_CLIENTID=user.00000000-0000-0000-0000-000000000000
BW_CLIENTSECRET='client-secret'
BW_PASSWORD='master-password'
";

/// A call received by [`FakeVault`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCall {
    ConfigureServer(String),
    Login { client_id: String },
    Unlock,
    GetSecret { name: String, field: SecretField, session: String },
    ListSecrets { session: String },
    Logout,
}

/// Scripted [`VaultClient`] that records every call.
///
/// By default every operation succeeds, unlock returns an empty token and no secrets exist.
#[derive(Debug, Default)]
pub struct FakeVault {
    server_error: Option<String>,
    login_error: Option<String>,
    unlock_result: Option<Result<String, String>>,
    secrets: HashMap<String, String>,
    list_error: Option<String>,
    logout_error: Option<String>,
    hang_on_get: bool,
    calls: Mutex<Vec<VaultCall>>,
}

impl FakeVault {
    /// Vault whose unlock succeeds with `token`.
    pub fn unlocked(token: &str) -> Self {
        Self {
            unlock_result: Some(Ok(token.to_owned())),
            ..Default::default()
        }
    }

    /// Add a secret whose password field is `value`.
    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_owned(), value.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn failing_server(mut self, message: &str) -> Self {
        self.server_error = Some(message.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn failing_login(mut self, message: &str) -> Self {
        self.login_error = Some(message.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn failing_unlock(mut self, message: &str) -> Self {
        self.unlock_result = Some(Err(message.to_owned()));
        self
    }

    #[allow(missing_docs)]
    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn failing_logout(mut self, message: &str) -> Self {
        self.logout_error = Some(message.to_owned());
        self
    }

    /// Make `get_secret` never complete, to simulate an interrupt mid-command.
    pub fn hanging_on_get(mut self) -> Self {
        self.hang_on_get = true;
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<VaultCall> {
        self.lock_calls().clone()
    }

    /// Number of `logout` calls received so far.
    pub fn logouts(&self) -> usize {
        self.lock_calls()
            .iter()
            .filter(|c| **c == VaultCall::Logout)
            .count()
    }

    fn record(&self, call: VaultCall) {
        self.lock_calls().push(call);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<VaultCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn scripted(operation: VaultOperation, error: &Option<String>) -> Result<(), VaultError> {
    match error {
        Some(message) => Err(VaultError::new(operation, message.clone())),
        None => Ok(()),
    }
}

#[async_trait::async_trait]
impl VaultClient for FakeVault {
    async fn configure_server(&self, url: &str) -> Result<(), VaultError> {
        self.record(VaultCall::ConfigureServer(url.to_owned()));
        scripted(VaultOperation::ConfigureServer, &self.server_error)
    }

    async fn login(&self, client_id: &str, _client_secret: &str) -> Result<(), VaultError> {
        self.record(VaultCall::Login {
            client_id: client_id.to_owned(),
        });
        scripted(VaultOperation::Login, &self.login_error)
    }

    async fn unlock(&self, _password: &str) -> Result<SessionToken, VaultError> {
        self.record(VaultCall::Unlock);
        match &self.unlock_result {
            Some(Ok(token)) => Ok(SessionToken::new(token.clone())),
            Some(Err(message)) => Err(VaultError::new(VaultOperation::Unlock, message.clone())),
            None => Ok(SessionToken::new("")),
        }
    }

    async fn get_secret(
        &self,
        name: &str,
        field: SecretField,
        session: &SessionToken,
    ) -> Result<String, VaultError> {
        self.record(VaultCall::GetSecret {
            name: name.to_owned(),
            field,
            session: session.expose().to_owned(),
        });
        if self.hang_on_get {
            std::future::pending::<()>().await;
        }
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| VaultError::new(VaultOperation::GetSecret, "Not found."))
    }

    async fn list_secret_names(&self, session: &SessionToken) -> Result<Vec<String>, VaultError> {
        self.record(VaultCall::ListSecrets {
            session: session.expose().to_owned(),
        });
        scripted(VaultOperation::ListSecrets, &self.list_error)?;

        let mut names: Vec<String> = self.secrets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn logout(&self) -> Result<(), VaultError> {
        self.record(VaultCall::Logout);
        scripted(VaultOperation::Logout, &self.logout_error)
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    resolvable: HashMap<String, PathBuf>,
    replies: HashMap<String, ProcessOutput>,
    provides: HashMap<String, (String, PathBuf)>,
    invocations: Vec<Invocation>,
}

/// [`CommandRunner`] that never spawns anything.
///
/// Programs are only resolvable once registered, every run is recorded, and replies are scripted
/// per program name. Unscripted programs succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl RecordingRunner {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` resolvable at `path`.
    pub fn with_program(self, program: &str, path: impl Into<PathBuf>) -> Self {
        self.lock()
            .resolvable
            .insert(program.to_owned(), path.into());
        self
    }

    /// Reply to runs of `program` with `output`.
    pub fn replying(self, program: &str, output: ProcessOutput) -> Self {
        self.lock().replies.insert(program.to_owned(), output);
        self
    }

    /// When a run of `program` succeeds, `provided` becomes resolvable at `path`.
    pub fn providing(self, program: &str, provided: &str, path: impl Into<PathBuf>) -> Self {
        self.lock()
            .provides
            .insert(program.to_owned(), (provided.to_owned(), path.into()));
        self
    }

    /// Every invocation run so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    /// File names of the programs run so far, in order.
    pub fn programs_run(&self) -> Vec<String> {
        self.lock()
            .invocations
            .iter()
            .map(|i| program_name(i.program()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn program_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.lock().resolvable.get(program).cloned()
    }

    async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let mut state = self.lock();
        state.invocations.push(invocation.clone());

        let name = program_name(invocation.program());
        let output = state
            .replies
            .get(&name)
            .cloned()
            .unwrap_or_else(|| success(""));

        if output.success {
            if let Some((provided, path)) = state.provides.get(&name).cloned() {
                state.resolvable.insert(provided, path);
            }
        }
        Ok(output)
    }
}

/// Output of a process that exited with status 0.
pub fn success(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        success: true,
        code: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

/// Output of a process that exited with status 1.
pub fn failure(stderr: &str) -> ProcessOutput {
    ProcessOutput {
        success: false,
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

/// Build an in-memory zip archive containing `files`.
pub fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
        for (path, content) in files {
            writer
                .start_file(*path, zip::write::SimpleFileOptions::default())
                .expect("zip entry should start");
            writer.write_all(content).expect("zip entry should be written");
        }
        writer.finish().expect("zip archive should finish");
    }
    buf
}
