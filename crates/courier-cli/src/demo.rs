//! Posts one request several times through a dispatcher and prints what
//! comes back.

use std::cell::RefCell;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use courier::dispatch::Dispatcher;
use courier::http::{HttpRequest, HttpResponse};
use courier::resolver::Query;
use courier_config::Config;

use crate::cli::{Cli, OutputFormat};
use crate::{AppError, IoStreams};

/// Output rendered by completion callbacks, waiting to be written.
#[derive(Debug, Default)]
struct Transcript {
    stdout: String,
    stderr: String,
}

impl Transcript {
    fn record(&mut self, sequence: u32, response: &str, format: OutputFormat) {
        self.stdout
            .push_str(&format!("=========== {sequence} ==========\n"));
        if format == OutputFormat::Raw {
            self.stdout.push_str(&format!("{response}\n"));
            return;
        }
        match HttpResponse::parse(response) {
            Ok(parsed) => {
                if !parsed.is_complete() {
                    self.stderr
                        .push_str(&format!("warning: response {sequence} is truncated\n"));
                }
                self.stdout
                    .push_str(&format!("{}\n{}\n", parsed.summary(), parsed.body()));
            }
            Err(error) => {
                self.stderr.push_str(&format!(
                    "warning: response {sequence} is not valid HTTP: {error}\n"
                ));
                self.stdout.push_str(&format!("{response}\n"));
            }
        }
    }

    fn flush_into<W, E>(&mut self, io: &mut IoStreams<'_, W, E>) -> Result<(), AppError>
    where
        W: Write,
        E: Write,
    {
        io.stderr.write_all(mem::take(&mut self.stderr).as_bytes())?;
        io.stdout.write_all(mem::take(&mut self.stdout).as_bytes())?;
        io.stdout.flush()?;
        Ok(())
    }
}

/// Builds the request the demo posts.
pub(crate) fn build_request(cli: &Cli, config: &Config, query: Query) -> HttpRequest {
    let request = HttpRequest::for_target(cli.method, query.address(), query.port(), &cli.target)
        .connection(config.connection_header());
    match &cli.body {
        Some(body) => request.body(body.as_str()),
        None => request,
    }
}

/// Runs the demo to completion, printing each response as it is delivered.
///
/// Individual request failures are reported through telemetry only; they
/// never change the outcome.
pub(crate) fn run_demo<W, E>(
    cli: &Cli,
    config: &Config,
    io: &mut IoStreams<'_, W, E>,
) -> Result<(), AppError>
where
    W: Write,
    E: Write,
{
    let query = Query::parse(&cli.address, cli.port)?;
    let wire = build_request(cli, config, query).to_wire();
    let dispatcher = Dispatcher::builder(query).config(config).build()?;
    let transcript = Rc::new(RefCell::new(Transcript::default()));

    for sequence in 1..=cli.requests {
        if sequence == cli.requests && cli.requests > 1 {
            dispatcher.post(wire.as_str());
        } else {
            let sink = Rc::clone(&transcript);
            let format = cli.output;
            dispatcher.post_with(wire.as_str(), move |response| {
                sink.borrow_mut().record(sequence, &response, format);
            });
        }
        transcript.borrow_mut().flush_into(io)?;
    }
    while dispatcher.run_one() > 0 {
        transcript.borrow_mut().flush_into(io)?;
    }
    Ok(())
}
