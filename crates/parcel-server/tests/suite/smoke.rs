use std::net::TcpListener;

use hyper::header::AUTHORIZATION;
use hyper::{Body, Client, Method, Request, StatusCode};
use parcel_server::serve;
use tokio::sync::oneshot;

use super::{basic, state, PUBLISHER, READER};

#[tokio::test(flavor = "current_thread")]
async fn serves_uploads_and_downloads_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("listener addr");
    listener
        .set_nonblocking(true)
        .expect("set listener nonblocking");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(serve(state(), listener, async {
        let _ = shutdown_rx.await;
    }));

    let client = Client::new();

    let upload = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{addr}/smoke-0.1.0-py3-none-any.whl"))
        .header(AUTHORIZATION, basic(PUBLISHER))
        .body(Body::from("wheel bytes"))
        .unwrap();
    let response = client.request(upload).await.expect("upload request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let download = Request::builder()
        .uri(format!("http://{addr}/smoke-latest-py3-none-any.whl"))
        .header(AUTHORIZATION, basic(READER))
        .body(Body::empty())
        .unwrap();
    let response = client.request(download).await.expect("download request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&body[..], b"wheel bytes");

    let _ = shutdown_tx.send(());
    server_handle
        .await
        .expect("server task")
        .expect("server shut down cleanly");
}
