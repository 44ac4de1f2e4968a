mod rw_split;

pub use rw_split::ReplicaRouter;
