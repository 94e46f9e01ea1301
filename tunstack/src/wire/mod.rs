/*! Low-level packet access and construction.

# An overview over packet representations

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structures [`ipv4_packet`] and
   [`tcp_packet`].
 * Second, it provides a compact, high-level representation of header data that can be parsed
   from and emitted into a sequence of octets. This happens in [`Ipv4Header`] and [`TcpHeader`].

The lowercase family guarantees that, if the `check_len()` method returned `Ok(())`, then no field
accessor or setter method will panic. The `parse` functions of the header family never panic, the
`emit` functions only panic when given a buffer shorter than the fixed header.

Neither header supports options. Inbound options are skipped over by their length fields,
outbound headers always have the fixed length of 20 octets.

# Examples

To emit an IP header into an octet buffer, and then parse it back:

```rust
use tunstack::wire::*;

let header = Ipv4Header::new(
    Ipv4Address::new(10, 0, 0, 1),
    Ipv4Address::new(10, 0, 0, 2),
    0);
let bytes = header.marshal();
assert!(ipv4_packet::new_checked(&bytes).unwrap().verify_checksum());

let parsed = Ipv4Header::parse(&bytes).unwrap();
assert_eq!(parsed.src_addr, header.src_addr);
assert_eq!(parsed.total_len, 20);
```
*/

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod error;
mod ip;
mod ipv4;
mod tcp;

pub use self::error::{
    Error,
    Result,
};

pub use self::ip::{
    checksum,
    Protocol as IpProtocol,
};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    Header as Ipv4Header,
    HEADER_LEN as IPV4_HEADER_LEN,
};

pub use self::tcp::{
    tcp as tcp_packet,
    Flags as TcpFlags,
    Header as TcpHeader,
    SeqNumber as TcpSeqNumber,
    HEADER_LEN as TCP_HEADER_LEN,
};
