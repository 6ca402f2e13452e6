/// An arena-resident skiplist node. `payload` is `None` only while the node sits on a free
/// list; every reachable node (including `HEAD`, whose payload is always `None`) has `prev`/
/// `next` sized to its height.
pub(crate) struct Node<P> {
    pub(crate) payload: Option<P>,
    pub(crate) height: usize,
    pub(crate) prev: Vec<Option<usize>>,
    pub(crate) next: Vec<Option<usize>>,
}
