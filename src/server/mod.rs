use log::{debug, error, info, trace};
use std::{
    io::{self, Cursor, Read},
    sync::Arc,
    thread::{self, JoinHandle},
};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

/// Read the fields of urlencoded and multipart request bodies.
pub mod form;
/// Routing, authentication and rendering of the requests.
pub mod handler;
/// Stop the server gracefully on termination signals.
pub mod signal;

use handler::{Reply, RequestHandler, BODY_TOO_LARGE, UNREADABLE_BODY};

const MAX_BODY_SIZE: u64 = 1024 * 1024;

/// A custom error for describing the error cases of the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server cannot listen on the address. The parameters are the address and the reason.
    #[error("cannot start server on {0}: {1}")]
    CannotBind(String, String),
}

#[derive(Debug, Error)]
enum BodyError {
    #[error("request body is larger than {MAX_BODY_SIZE} bytes")]
    TooLarge,
    #[error("cannot read request body: {0}")]
    Unreadable(#[from] io::Error),
}

/// A minimal HTTP 1.1 server, that passes every request to the [RequestHandler].
///
/// Every request is handled on its own thread, so a long pull doesn't block
/// the requests for other repositories.
pub struct HttpServer {
    server: Arc<Server>,
}

impl HttpServer {
    /// Bind the server to an address, for example "0.0.0.0:1234".
    pub fn bind(address: &str) -> Result<Self, ServerError> {
        let server = Server::http(address)
            .map_err(|err| ServerError::CannotBind(address.to_string(), err.to_string()))?;
        info!("Listening on {address}...");

        Ok(HttpServer {
            server: Arc::new(server),
        })
    }

    /// Returns a function that stops [HttpServer::listen] from accepting new requests.
    pub fn stopper(&self) -> impl Fn() + Send + Sync + 'static {
        let server = self.server.clone();
        move || server.unblock()
    }

    /// Accept requests until the server is stopped, then wait for the running requests to finish.
    pub fn listen(&self, handler: Arc<RequestHandler>) {
        let mut running: Vec<JoinHandle<()>> = vec![];

        for request in self.server.incoming_requests() {
            let handler = handler.clone();
            running.push(thread::spawn(move || handle_request(&handler, request)));
            running.retain(|handle| !handle.is_finished());
        }

        debug!("Server stopped, waiting for {} running requests.", running.len());
        for handle in running {
            if handle.join().is_err() {
                error!("A request handler panicked.");
            }
        }
    }
}

fn handle_request(handler: &RequestHandler, mut request: Request) {
    // The query string can contain the token
    let path = request.url().split('?').next().unwrap_or_default();
    debug!("Received request on {} {path}.", request.method());

    let reply = match read_body(request.as_reader()) {
        Ok(body) => {
            trace!("Request body has {} bytes.", body.len());
            let content_type = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Content-Type"))
                .map(|header| header.value.as_str());
            handler.handle(request.method(), request.url(), content_type, &body)
        }
        Err(err) => {
            debug!("{err}.");
            match err {
                BodyError::TooLarge => Reply::text(413, BODY_TOO_LARGE),
                BodyError::Unreadable(_) => Reply::text(400, UNREADABLE_BODY),
            }
        }
    };

    debug!("Responding with {}.", reply.status);
    if let Err(err) = request.respond(into_response(reply)) {
        error!("Cannot respond to request: {err}.");
    }
}

fn read_body(reader: impl Read) -> Result<Vec<u8>, BodyError> {
    let mut body = vec![];
    reader.take(MAX_BODY_SIZE + 1).read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_SIZE {
        return Err(BodyError::TooLarge);
    }

    Ok(body)
}

fn into_response(reply: Reply) -> Response<Cursor<Vec<u8>>> {
    let content_type: &[u8] = if reply.html {
        b"text/html; charset=utf-8"
    } else {
        b"text/plain; charset=utf-8"
    };

    let response = Response::from_string(reply.body).with_status_code(reply.status);
    match Header::from_bytes(&b"Content-Type"[..], content_type) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
