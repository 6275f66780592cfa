use std::sync::Arc;

use crate::ports::http_server::Handler;

/// A middleware turns the next handler into a handler wrapping it.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;
}

impl<F> Middleware for F
where
    F: Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync + 'static,
{
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self(next)
    }
}

/// Nest `middlewares` around `terminal`.
///
/// Folds from the last registered to the first, so the first registered
/// middleware is the outermost one: it sees the request first and the
/// response last.
pub fn compose(middlewares: &[Arc<dyn Middleware>], terminal: Arc<dyn Handler>) -> Arc<dyn Handler> {
    middlewares
        .iter()
        .rev()
        .fold(terminal, |next, middleware| middleware.wrap(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use hyper::Request;

    use super::*;
    use crate::ports::http_server::{HandlerFuture, handler_fn};
    use crate::ports::response_writer::{BufferedResponse, ResponseWriter};

    struct Tag {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
        next: Arc<dyn Handler>,
    }

    impl Handler for Tag {
        fn serve<'a>(
            &'a self,
            req: &'a mut Request<()>,
            w: &'a mut dyn ResponseWriter,
        ) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.events.lock().unwrap().push(format!("{} before", self.name));
                self.next.serve(req, w).await?;
                self.events.lock().unwrap().push(format!("{} after", self.name));
                Ok(())
            })
        }
    }

    fn tag(name: &'static str, events: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        let events = events.clone();
        Arc::new(move |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
            Arc::new(Tag {
                name,
                events: events.clone(),
                next,
            })
        })
    }

    #[tokio::test]
    async fn test_first_registered_is_outermost() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let terminal_events = events.clone();
        let terminal: Arc<dyn Handler> = Arc::new(handler_fn(move |_req, w| {
            let events = terminal_events.clone();
            Box::pin(async move {
                events.lock().unwrap().push("terminal".to_string());
                w.write(Bytes::from_static(b"body")).await?;
                Ok(())
            })
        }));

        let chain = compose(&[tag("a", &events), tag("b", &events)], terminal);

        let mut req = Request::new(());
        let mut out = BufferedResponse::new();
        chain.serve(&mut req, &mut out).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["a before", "b before", "terminal", "b after", "a after"]
        );
        assert_eq!(out.body_string(), "body");
    }

    #[tokio::test]
    async fn test_compose_without_middlewares_is_terminal() {
        let terminal: Arc<dyn Handler> = Arc::new(handler_fn(|_req, w| {
            Box::pin(async move {
                w.write(Bytes::from_static(b"plain")).await?;
                Ok(())
            })
        }));

        let chain = compose(&[], terminal);
        let mut req = Request::new(());
        let mut out = BufferedResponse::new();
        chain.serve(&mut req, &mut out).await.unwrap();

        assert_eq!(out.body_string(), "plain");
    }
}
