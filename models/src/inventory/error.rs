use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to list Nodes matching selector '{}': '{}'", selector, source))]
    ListNodes {
        source: kube::Error,
        selector: String,
    },

    #[snafu(display(
        "Unable to list Pods in namespace '{}' matching selector '{}': '{}'",
        namespace,
        selector,
        source
    ))]
    ListPods {
        source: kube::Error,
        namespace: String,
        selector: String,
    },
}
