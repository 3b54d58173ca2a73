//! Turning a [`Pipeline`] into running processes.
//!
//! Every descriptor of the graph has exactly one owner per process role: the
//! parent holds all pipe ends until the last fork, then drops them; each child
//! duplicates the ends it needs onto 0/1/2 and drops every pipe it inherited
//! before calling `execvp`. Pipes are also created close-on-exec, so an end
//! that survives by mistake still cannot reach another program.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, error, trace};

use crate::command::{Completion, ExitCode};
use crate::error::SpawnError;
use crate::pipeline::Pipeline;
use crate::redirect::{OUTPUT_MODE, RedirectionTarget};

const COMMAND_NOT_FOUND: &[u8] = b"Error: command not found\n";

/// Run a validated pipeline to completion.
///
/// Forks one child per stage, waits for all of them in stage order and
/// returns their statuses. A stage whose program cannot be executed reports
/// `Error: command not found` itself and exits with 1; that is an ordinary
/// status here, not an error.
pub fn run(pipeline: &Pipeline<'_>) -> Result<Completion, SpawnError> {
    let programs = pipeline
        .stages()
        .iter()
        .map(|stage| Program::new(stage.args()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = pipeline.redirect().map(OutputFile::new).transpose()?;

    let statuses = match programs.as_slice() {
        [] => Vec::new(),
        [single] => run_single(single, output.as_ref())?,
        _ => {
            let graph = ProcessGraph::allocate(pipeline.pipe_count())?;
            run_piped(graph, &programs, output.as_ref(), pipeline.merge_stderr())?
        }
    };
    Ok(Completion::new(pipeline.line(), statuses))
}

fn run_single(
    program: &Program,
    output: Option<&OutputFile>,
) -> Result<Vec<ExitCode>, SpawnError> {
    let mut graph = ProcessGraph::default();
    graph.spawn(0, 1, program, output, false)?;
    graph.wait_all()
}

fn run_piped(
    mut graph: ProcessGraph,
    programs: &[Program],
    output: Option<&OutputFile>,
    merge_stderr: bool,
) -> Result<Vec<ExitCode>, SpawnError> {
    let count = programs.len();
    for (index, program) in programs.iter().enumerate() {
        if let Err(e) = graph.spawn(index, count, program, output, merge_stderr) {
            error!(stage = index, error = %e, "aborting pipeline");
            graph.abandon();
            return Err(e);
        }
    }
    graph.close_pipes();
    debug_assert_eq!(graph.open_descriptors(), 0);
    graph.wait_all()
}

/// Argument vector of one stage, converted before forking.
struct Program {
    argv: Vec<CString>,
}

impl Program {
    fn new(args: &[&str]) -> Result<Self, SpawnError> {
        let argv = args
            .iter()
            .map(|arg| CString::new(*arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { argv })
    }

    /// Replace the current process image. Only returns on failure.
    fn exec(&self) -> Errno {
        match unistd::execvp(&self.argv[0], &self.argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}

/// Redirection target, converted before forking.
struct OutputFile {
    path: CString,
    merge_stderr: bool,
}

impl OutputFile {
    fn new(target: &RedirectionTarget) -> Result<Self, SpawnError> {
        Ok(Self {
            path: CString::new(target.path.as_os_str().as_bytes())?,
            merge_stderr: target.merge_stderr,
        })
    }

    /// Open the file for the last stage and put it on stdout (and stderr).
    fn attach(&self) -> nix::Result<()> {
        let fd = fcntl::open(
            self.path.as_c_str(),
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            Mode::from_bits_truncate(OUTPUT_MODE),
        )?;
        unistd::dup2(fd, STDOUT_FILENO)?;
        if self.merge_stderr {
            unistd::dup2(fd, STDERR_FILENO)?;
        }
        if fd != STDOUT_FILENO && fd != STDERR_FILENO {
            unistd::close(fd)?;
        }
        Ok(())
    }
}

/// Read and write ends of one inter-stage pipe.
#[derive(Debug)]
struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

/// Pipes and children of one running pipeline.
///
/// Pipe `i` joins stage `i` (writer) to stage `i + 1` (reader). Children are
/// recorded with their stage index in spawn order, which is the order they
/// are waited for.
#[derive(Debug, Default)]
pub struct ProcessGraph {
    pipes: Vec<Pipe>,
    children: Vec<(usize, Pid)>,
}

impl ProcessGraph {
    /// Create all `pipe_count` pipes up front, before any fork.
    pub fn allocate(pipe_count: usize) -> Result<Self, SpawnError> {
        let mut pipes = Vec::with_capacity(pipe_count);
        for _ in 0..pipe_count {
            let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(SpawnError::Pipe)?;
            pipes.push(Pipe { read, write });
        }
        debug!(pipes = pipe_count, "allocated pipes");
        Ok(Self {
            pipes,
            children: Vec::with_capacity(pipe_count + 1),
        })
    }

    /// Pipe descriptors this process still holds.
    pub fn open_descriptors(&self) -> usize {
        self.pipes.len() * 2
    }

    /// Drop every pipe end held by this process.
    pub fn close_pipes(&mut self) {
        self.pipes.clear();
    }

    /// Fork the process for stage `index` of `count`.
    ///
    /// Returns in the parent only; the child execs or exits.
    fn spawn(
        &mut self,
        index: usize,
        count: usize,
        program: &Program,
        output: Option<&OutputFile>,
        merge_stderr: bool,
    ) -> Result<(), SpawnError> {
        // SAFETY: the child only calls dup2/open/close/execvp/write/_exit.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!(stage = index, pid = %child, "forked stage");
                self.children.push((index, child));
                Ok(())
            }
            Ok(ForkResult::Child) => {
                self.become_stage(index, count, program, output, merge_stderr)
            }
            Err(errno) => Err(SpawnError::Fork(errno)),
        }
    }

    /// Child side of [`spawn`](Self::spawn).
    fn become_stage(
        &mut self,
        index: usize,
        count: usize,
        program: &Program,
        output: Option<&OutputFile>,
        merge_stderr: bool,
    ) -> ! {
        if let Err(errno) = self.wire(index, count, output, merge_stderr) {
            write_stderr(b"Error: ");
            write_stderr(errno.desc().as_bytes());
            write_stderr(b"\n");
            exit_child(1);
        }
        self.close_pipes();
        let _ = program.exec();
        write_stderr(COMMAND_NOT_FOUND);
        exit_child(1)
    }

    /// Point stdin/stdout/stderr of the current process at its neighbours.
    ///
    /// Only the last stage can carry the output file, so a redirected stage
    /// never has its stdout on a pipe.
    fn wire(
        &self,
        index: usize,
        count: usize,
        output: Option<&OutputFile>,
        merge_stderr: bool,
    ) -> nix::Result<()> {
        if index > 0 {
            unistd::dup2(self.pipes[index - 1].read.as_raw_fd(), STDIN_FILENO)?;
        }
        if index + 1 < count {
            let write: RawFd = self.pipes[index].write.as_raw_fd();
            unistd::dup2(write, STDOUT_FILENO)?;
            if merge_stderr {
                unistd::dup2(write, STDERR_FILENO)?;
            }
        } else if let Some(output) = output {
            output.attach()?;
        }
        Ok(())
    }

    /// Wait for every child in stage order and collect its status.
    ///
    /// All children are reaped even if one wait fails; the first failure is returned.
    pub fn wait_all(&mut self) -> Result<Vec<ExitCode>, SpawnError> {
        let mut statuses = Vec::with_capacity(self.children.len());
        let mut failure = None;
        for (index, pid) in std::mem::take(&mut self.children) {
            match wait_for(pid) {
                Ok(status) => {
                    trace!(stage = index, pid = %pid, status, "reaped stage");
                    statuses.push(status);
                }
                Err(e) => {
                    error!(stage = index, pid = %pid, error = %e, "lost stage");
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(statuses),
        }
    }

    /// Give up on a partly built graph: close the pipes so running stages
    /// see end-of-input, then reap them.
    fn abandon(&mut self) {
        self.close_pipes();
        if let Err(e) = self.wait_all() {
            error!(error = %e, "reaping abandoned pipeline");
        }
    }
}

fn wait_for(pid: Pid) -> Result<ExitCode, SpawnError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(errno) => return Err(SpawnError::Wait(errno)),
        }
    }
}

fn write_stderr(msg: &[u8]) {
    // SAFETY: plain write(2) of a valid buffer; no allocation or locking after fork.
    unsafe {
        libc::write(STDERR_FILENO, msg.as_ptr().cast(), msg.len());
    }
}

fn exit_child(code: i32) -> ! {
    // SAFETY: skips atexit handlers and stdio buffers that belong to the parent.
    unsafe { libc::_exit(code) }
}
