mod common;
mod failure;
mod full;
mod psk;
mod resumption;
mod retransmit;
