// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process identity used to name log files.

use std::path::Path;

const UNKNOWN_HOST: &str = "unknownhost";
const UNKNOWN_USER: &str = "unknownuser";
const UNKNOWN_PROGRAM: &str = "unknown";

/// The program, host, user and process id of the running process.
///
/// It is read once when a backend is created and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    program: String,
    host: String,
    user: String,
    pid: u32,
}

impl Identity {
    /// Look up the identity of the current process.
    ///
    /// `program` overrides the program name derived from the first command line argument.
    pub fn current(program: Option<&str>) -> Identity {
        let program = match program {
            Some(program) => program.to_string(),
            None => program_name().unwrap_or_else(|| UNKNOWN_PROGRAM.to_string()),
        };
        let host = hostname().unwrap_or_else(|| UNKNOWN_HOST.to_string());
        let user = user_name().unwrap_or_else(|| UNKNOWN_USER.to_string());
        Identity::new(program, host, user, std::process::id())
    }

    /// Create an identity from explicit parts.
    ///
    /// The host name is truncated at its first period and the user name is sanitized to
    /// `[A-Za-z0-9_]`, exactly as for [`Identity::current`].
    pub fn new(
        program: impl Into<String>,
        host: impl AsRef<str>,
        user: impl AsRef<str>,
        pid: u32,
    ) -> Identity {
        Identity {
            program: program.into(),
            host: short_hostname(host.as_ref()).to_string(),
            user: sanitize_user(user.as_ref()),
            pid,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Return `hostname` truncated at the first period, e.g. `www` for `www.example.com`.
pub(crate) fn short_hostname(hostname: &str) -> &str {
    match hostname.find('.') {
        Some(i) => &hostname[..i],
        None => hostname,
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`; the result is used in file paths.
pub(crate) fn sanitize_user(user: &str) -> String {
    user.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn program_name() -> Option<String> {
    let arg0 = std::env::args_os().next()?;
    let name = Path::new(&arg0).file_name()?.to_str()?;
    Some(name.to_string())
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for writes of `buf.len()` bytes.
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if ret != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|s| !s.is_empty())
}

fn user_name() -> Option<String> {
    for key in ["USER", "LOGNAME", "USERNAME"] {
        if let Ok(user) = std::env::var(key)
            && !user.is_empty()
        {
            return Some(user);
        }
    }
    passwd_user_name()
}

#[cfg(unix)]
fn passwd_user_name() -> Option<String> {
    use std::ffi::CStr;

    // SAFETY: getuid never fails.
    let uid = unsafe { libc::getuid() };
    // SAFETY: passwd is a plain C struct; all-zero is a valid value.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0 as libc::c_char; 4096];
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    // SAFETY: every pointer is valid for the duration of the call.
    let ret = unsafe { libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result) };
    if ret != 0 || result.is_null() || pwd.pw_name.is_null() {
        return None;
    }
    // SAFETY: pw_name points into `buf`, which is still alive, and is NUL-terminated.
    let name = unsafe { CStr::from_ptr(pwd.pw_name) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn passwd_user_name() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname("www.example.com"), "www");
        assert_eq!(short_hostname("localhost"), "localhost");
        assert_eq!(short_hostname(".hidden"), "");
    }

    #[test]
    fn test_sanitize_user() {
        assert_eq!(sanitize_user("alice"), "alice");
        assert_eq!(sanitize_user("DOMAIN\\bob.smith"), "DOMAIN_bob_smith");
        assert_eq!(sanitize_user("ü-1"), "__1");
    }

    #[test]
    fn test_identity_new_normalizes() {
        let id = Identity::new("server", "db1.prod.example", "svc-user", 42);
        assert_eq!(id.program(), "server");
        assert_eq!(id.host(), "db1");
        assert_eq!(id.user(), "svc_user");
        assert_eq!(id.pid(), 42);
    }

    #[test]
    fn test_current_identity_overrides_program() {
        let id = Identity::current(Some("custom"));
        assert_eq!(id.program(), "custom");
        assert!(!id.host().contains('.'));
        assert!(id.user().chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_eq!(id.pid(), std::process::id());
    }
}
